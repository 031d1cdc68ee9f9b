use common::UserId;
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{Money, Order, OrderItem, OrderStatus};

fn bench_place_order(c: &mut Criterion) {
    let items: Vec<OrderItem> = (0..20)
        .map(|i| OrderItem::new(format!("SKU-{i:03}"), 2, Money::from_cents(1000 + i)))
        .collect();

    c.bench_function("domain/place_order", |b| {
        b.iter(|| {
            let order = Order::place(UserId::new(), items.clone()).unwrap();
            std::hint::black_box(order);
        });
    });
}

fn bench_transition_check(c: &mut Criterion) {
    c.bench_function("domain/transition_table_scan", |b| {
        b.iter(|| {
            let mut allowed = 0usize;
            for from in OrderStatus::ALL {
                for to in OrderStatus::ALL {
                    if from.can_transition_to(to) {
                        allowed += 1;
                    }
                }
            }
            std::hint::black_box(allowed);
        });
    });
}

fn bench_full_lifecycle(c: &mut Criterion) {
    c.bench_function("domain/full_lifecycle", |b| {
        b.iter(|| {
            let mut order = Order::place(
                UserId::new(),
                vec![OrderItem::new("SKU-001", 2, Money::from_cents(1000))],
            )
            .unwrap();
            order.transition(OrderStatus::Processing).unwrap();
            order.transition(OrderStatus::Shipped).unwrap();
            order.transition(OrderStatus::Delivered).unwrap();
            std::hint::black_box(order);
        });
    });
}

criterion_group!(
    benches,
    bench_place_order,
    bench_transition_check,
    bench_full_lifecycle
);
criterion_main!(benches);

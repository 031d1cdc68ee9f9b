//! Order entity.

use chrono::{DateTime, Utc};
use common::{OrderId, UserId};
use serde::{Deserialize, Serialize};

use super::{Money, OrderError, OrderItem, OrderStatus};

/// An order placed by a user.
///
/// Created as a `Pending` shell before the payment outcome is known, so that
/// a declined payment still has an order to carry the `PaymentFailed` record.
/// Items are frozen at creation; only the status (and its change timestamp)
/// may move afterwards, under the transition table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    user_id: UserId,
    order_date: DateTime<Utc>,
    last_status_change_at: DateTime<Utc>,
    total_amount: Money,
    status: OrderStatus,
    items: Vec<OrderItem>,
}

impl Order {
    /// Builds a `Pending` order shell from frozen line items.
    ///
    /// The total is computed from the items' snapshot prices. Fails with
    /// `NoItems` for an empty item list.
    pub fn place(user_id: UserId, items: Vec<OrderItem>) -> Result<Self, OrderError> {
        if items.is_empty() {
            return Err(OrderError::NoItems);
        }

        let total_amount = items.iter().map(OrderItem::total_price).sum();
        let now = Utc::now();

        Ok(Self {
            id: OrderId::new(),
            user_id,
            order_date: now,
            last_status_change_at: now,
            total_amount,
            status: OrderStatus::Pending,
            items,
        })
    }

    /// Reassembles an order from its stored parts.
    ///
    /// Used by storage backends; performs no validation beyond the type
    /// system.
    pub fn from_parts(
        id: OrderId,
        user_id: UserId,
        order_date: DateTime<Utc>,
        last_status_change_at: DateTime<Utc>,
        total_amount: Money,
        status: OrderStatus,
        items: Vec<OrderItem>,
    ) -> Self {
        Self {
            id,
            user_id,
            order_date,
            last_status_change_at,
            total_amount,
            status,
            items,
        }
    }

    /// Returns the order ID.
    pub fn id(&self) -> OrderId {
        self.id
    }

    /// Returns the user who placed the order.
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns when the order was created. Never changes after placement.
    pub fn order_date(&self) -> DateTime<Utc> {
        self.order_date
    }

    /// Returns when the status last changed.
    pub fn last_status_change_at(&self) -> DateTime<Utc> {
        self.last_status_change_at
    }

    /// Returns the billed total, computed from snapshot prices at placement.
    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    /// Returns the current status.
    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// Returns the frozen line items.
    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    /// Returns the number of line items.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the order is in a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Moves the order to `next` if the transition table allows it.
    ///
    /// Touches `last_status_change_at`; `order_date` is never modified.
    pub fn transition(&mut self, next: OrderStatus) -> Result<(), OrderError> {
        if !self.status.can_transition_to(next) {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        self.status = next;
        self.last_status_change_at = Utc::now();
        Ok(())
    }

    /// Records a definitive payment failure on a freshly placed shell.
    ///
    /// This is the placement workflow folding the payment outcome into order
    /// creation, not a table transition; `transition` continues to reject
    /// `Pending -> PaymentFailed` for already-persisted orders.
    pub fn fail_payment(&mut self) -> Result<(), OrderError> {
        if self.status != OrderStatus::Pending {
            return Err(OrderError::PaymentOutcomeNotApplicable {
                expected: OrderStatus::Pending,
                actual: self.status,
            });
        }

        self.status = OrderStatus::PaymentFailed;
        self.last_status_change_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placed_order() -> Order {
        Order::place(
            UserId::new(),
            vec![
                OrderItem::new("SKU-001", 2, Money::from_cents(1000)),
                OrderItem::new("SKU-002", 1, Money::from_cents(2500)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_place_computes_total_from_snapshots() {
        let order = placed_order();
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.total_amount().cents(), 4500);
        assert_eq!(order.item_count(), 2);
    }

    #[test]
    fn test_place_rejects_empty_items() {
        let result = Order::place(UserId::new(), vec![]);
        assert!(matches!(result, Err(OrderError::NoItems)));
    }

    #[test]
    fn test_valid_transition_updates_status() {
        let mut order = placed_order();
        order.transition(OrderStatus::Processing).unwrap();
        assert_eq!(order.status(), OrderStatus::Processing);
    }

    #[test]
    fn test_invalid_transition_is_rejected() {
        let mut order = placed_order();
        let err = order.transition(OrderStatus::Delivered).unwrap_err();
        assert!(matches!(
            err,
            OrderError::InvalidTransition {
                from: OrderStatus::Pending,
                to: OrderStatus::Delivered,
            }
        ));
        assert_eq!(order.status(), OrderStatus::Pending);
    }

    #[test]
    fn test_transition_touches_change_timestamp_only() {
        let mut order = placed_order();
        let created = order.order_date();
        let before_change = order.last_status_change_at();

        std::thread::sleep(std::time::Duration::from_millis(5));
        order.transition(OrderStatus::Processing).unwrap();

        assert_eq!(order.order_date(), created);
        assert!(order.last_status_change_at() > before_change);
    }

    #[test]
    fn test_full_lifecycle() {
        let mut order = placed_order();
        order.transition(OrderStatus::Processing).unwrap();
        order.transition(OrderStatus::Shipped).unwrap();
        order.transition(OrderStatus::Delivered).unwrap();

        assert!(order.is_terminal());
        assert!(order.transition(OrderStatus::Cancelled).is_err());
    }

    #[test]
    fn test_fail_payment_on_pending_shell() {
        let mut order = placed_order();
        order.fail_payment().unwrap();
        assert_eq!(order.status(), OrderStatus::PaymentFailed);
        assert!(order.is_terminal());
    }

    #[test]
    fn test_fail_payment_rejected_after_processing() {
        let mut order = placed_order();
        order.transition(OrderStatus::Processing).unwrap();
        assert!(order.fail_payment().is_err());
    }

    #[test]
    fn test_payment_failed_order_cannot_move() {
        let mut order = placed_order();
        order.fail_payment().unwrap();

        for next in OrderStatus::ALL {
            assert!(order.transition(next).is_err());
        }
    }

    #[test]
    fn test_serialization() {
        let order = placed_order();
        let json = serde_json::to_string(&order).unwrap();
        let deserialized: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(order, deserialized);
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, UserId};
use domain::{Order, OrderStatus};
use tokio::sync::RwLock;

use crate::{OrderStore, OrderStoreError, Result};

/// In-memory order store implementation for testing.
///
/// Stores orders in a map and provides the same interface as the
/// PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
}

impl InMemoryOrderStore {
    /// Creates a new empty in-memory order store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }

    /// Clears all orders.
    pub async fn clear(&self) {
        self.orders.write().await.clear();
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: &Order) -> Result<()> {
        let mut orders = self.orders.write().await;

        if orders.contains_key(&order.id()) {
            return Err(OrderStoreError::DuplicateOrder(order.id()));
        }

        orders.insert(order.id(), order.clone());
        Ok(())
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.orders.read().await.get(&order_id).cloned())
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        let mut result: Vec<Order> = orders
            .values()
            .filter(|order| order.user_id() == user_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.order_date().cmp(&a.order_date()));
        Ok(result)
    }

    async fn update_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
        changed_at: DateTime<Utc>,
    ) -> Result<Order> {
        let mut orders = self.orders.write().await;

        let order = orders
            .get(&order_id)
            .ok_or(OrderStoreError::OrderNotFound(order_id))?;

        let updated = Order::from_parts(
            order.id(),
            order.user_id(),
            order.order_date(),
            changed_at,
            order.total_amount(),
            status,
            order.items().to_vec(),
        );
        orders.insert(order_id, updated.clone());
        Ok(updated)
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, UserId};
use domain::{Order, OrderStatus};

use crate::Result;

/// Core trait for order store implementations.
///
/// An order store persists orders together with their frozen line items.
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists a new order with its items as one atomic unit.
    ///
    /// Fails with `DuplicateOrder` if an order with the same ID exists.
    async fn insert(&self, order: &Order) -> Result<()>;

    /// Retrieves an order with its items.
    ///
    /// Returns None if the order doesn't exist.
    async fn get(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Retrieves all orders placed by a user, newest first.
    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>>;

    /// Persists a status change for an existing order.
    ///
    /// Writes the new status and the status-change timestamp; the order's
    /// creation date and items are untouched. Transition validity is the
    /// caller's responsibility and must be checked before calling this.
    /// Returns the updated order, or `OrderNotFound`.
    async fn update_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
        changed_at: DateTime<Utc>,
    ) -> Result<Order>;
}

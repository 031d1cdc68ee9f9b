//! Order queries and state-machine-guarded status updates.

use chrono::Utc;
use common::{OrderId, UserId};
use domain::{Order, OrderStatus};
use order_store::OrderStore;

use crate::error::{CheckoutError, Result};
use crate::services::audit::{ACTION_UPDATE_ORDER_STATUS, AuditRecord, AuditSink};

/// Service for reading orders and moving them through the status graph.
pub struct OrderService<R, A> {
    orders: R,
    audit: A,
}

impl<R, A> OrderService<R, A>
where
    R: OrderStore,
    A: AuditSink,
{
    /// Creates a new order service.
    pub fn new(orders: R, audit: A) -> Self {
        Self { orders, audit }
    }

    /// Returns the status literals presentation layers may offer.
    pub fn available_statuses() -> Vec<&'static str> {
        OrderStatus::ALL.iter().map(OrderStatus::as_str).collect()
    }

    /// Retrieves one order with its items.
    #[tracing::instrument(skip(self))]
    pub async fn order_details(&self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.orders.get(order_id).await?)
    }

    /// Retrieves a user's orders, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn order_history(&self, user_id: UserId) -> Result<Vec<Order>> {
        Ok(self.orders.orders_for_user(user_id).await?)
    }

    /// Moves an order to the status named by `status_text`.
    ///
    /// Fails with `InvalidStatus` for unknown literals and
    /// `InvalidTransition` for pairs outside the transition table. Both
    /// checks run before anything is persisted.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(&self, order_id: OrderId, status_text: &str) -> Result<Order> {
        let next: OrderStatus = status_text.parse().map_err(CheckoutError::Domain)?;

        let mut order = self
            .orders
            .get(order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound(order_id))?;

        let previous = order.status();
        order.transition(next)?;

        let updated = self
            .orders
            .update_status(order_id, next, Utc::now())
            .await?;

        if let Err(error) = self
            .audit
            .record(AuditRecord::new(
                ACTION_UPDATE_ORDER_STATUS,
                "Order",
                Some(order_id.to_string()),
                Some(order.user_id()),
                format!("Status changed from {previous} to {next}"),
            ))
            .await
        {
            tracing::warn!(%error, "audit sink failure ignored");
        }

        tracing::info!(%order_id, %previous, %next, "order status updated");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::audit::InMemoryAuditSink;
    use domain::{Money, OrderError, OrderItem};
    use order_store::InMemoryOrderStore;

    fn service() -> (
        OrderService<InMemoryOrderStore, InMemoryAuditSink>,
        InMemoryOrderStore,
        InMemoryAuditSink,
    ) {
        let store = InMemoryOrderStore::new();
        let audit = InMemoryAuditSink::new();
        (
            OrderService::new(store.clone(), audit.clone()),
            store,
            audit,
        )
    }

    async fn stored_order(store: &InMemoryOrderStore, user_id: UserId) -> Order {
        let order = Order::place(
            user_id,
            vec![OrderItem::new("SKU-001", 2, Money::from_cents(1000))],
        )
        .unwrap();
        store.insert(&order).await.unwrap();
        order
    }

    #[test]
    fn test_available_statuses() {
        assert_eq!(
            OrderService::<InMemoryOrderStore, InMemoryAuditSink>::available_statuses(),
            vec![
                "Pending",
                "Processing",
                "Shipped",
                "Delivered",
                "Cancelled",
                "PaymentFailed"
            ]
        );
    }

    #[tokio::test]
    async fn test_update_status_happy_path() {
        let (service, store, audit) = service();
        let order = stored_order(&store, UserId::new()).await;

        let updated = service
            .update_status(order.id(), "Processing")
            .await
            .unwrap();

        assert_eq!(updated.status(), OrderStatus::Processing);
        let loaded = store.get(order.id()).await.unwrap().unwrap();
        assert_eq!(loaded.status(), OrderStatus::Processing);
        assert_eq!(
            audit.actions(),
            vec![ACTION_UPDATE_ORDER_STATUS.to_string()]
        );
    }

    #[tokio::test]
    async fn test_update_status_unknown_literal() {
        let (service, store, _) = service();
        let order = stored_order(&store, UserId::new()).await;

        let err = service.update_status(order.id(), "Refunded").await.unwrap_err();

        assert!(matches!(
            err,
            CheckoutError::Domain(OrderError::InvalidStatus { .. })
        ));
        // Nothing persisted
        let loaded = store.get(order.id()).await.unwrap().unwrap();
        assert_eq!(loaded.status(), OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_update_status_invalid_transition_not_persisted() {
        let (service, store, _) = service();
        let order = stored_order(&store, UserId::new()).await;

        let err = service.update_status(order.id(), "Delivered").await.unwrap_err();

        assert!(matches!(
            err,
            CheckoutError::Domain(OrderError::InvalidTransition { .. })
        ));
        let loaded = store.get(order.id()).await.unwrap().unwrap();
        assert_eq!(loaded.status(), OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_update_status_missing_order() {
        let (service, _, _) = service();
        let err = service
            .update_status(OrderId::new(), "Processing")
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::OrderNotFound(_)));
    }

    #[tokio::test]
    async fn test_order_history_newest_first() {
        let (service, store, _) = service();
        let user_id = UserId::new();

        let first = stored_order(&store, user_id).await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = stored_order(&store, user_id).await;

        let history = service.order_history(user_id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id(), second.id());
        assert_eq!(history[1].id(), first.id());
    }

    #[tokio::test]
    async fn test_order_details_missing() {
        let (service, _, _) = service();
        assert!(service.order_details(OrderId::new()).await.unwrap().is_none());
    }
}

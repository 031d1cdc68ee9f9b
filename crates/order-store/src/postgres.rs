use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, UserId};
use domain::{Money, Order, OrderItem, OrderStatus};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{OrderStore, OrderStoreError, Result};

/// PostgreSQL-backed order store implementation.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_order(row: &PgRow, items: Vec<OrderItem>) -> Result<Order> {
        let order_id = OrderId::from_uuid(row.try_get::<Uuid, _>("id")?);
        let status_text: String = row.try_get("status")?;
        let status: OrderStatus =
            status_text
                .parse()
                .map_err(|_| OrderStoreError::InvalidRecord {
                    order_id,
                    reason: format!("unknown status '{status_text}'"),
                })?;

        Ok(Order::from_parts(
            order_id,
            UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            row.try_get("order_date")?,
            row.try_get("last_status_change_at")?,
            Money::from_cents(row.try_get("total_amount_cents")?),
            status,
            items,
        ))
    }

    async fn load_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        let rows = sqlx::query(
            r#"
            SELECT product_id, quantity, unit_price_cents
            FROM order_items
            WHERE order_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let quantity: i32 = row.try_get("quantity")?;
                Ok(OrderItem::new(
                    row.try_get::<String, _>("product_id")?,
                    quantity as u32,
                    Money::from_cents(row.try_get("unit_price_cents")?),
                ))
            })
            .collect()
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    #[tracing::instrument(skip(self, order), fields(order_id = %order.id()))]
    async fn insert(&self, order: &Order) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, order_date, last_status_change_at, total_amount_cents, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.user_id().as_uuid())
        .bind(order.order_date())
        .bind(order.last_status_change_at())
        .bind(order.total_amount().cents())
        .bind(order.status().as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return OrderStoreError::DuplicateOrder(order.id());
            }
            OrderStoreError::Database(e)
        })?;

        for item in order.items() {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, product_id, quantity, unit_price_cents)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(order.id().as_uuid())
            .bind(item.product_id.as_str())
            .bind(item.quantity as i32)
            .bind(item.unit_price.cents())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, order_date, last_status_change_at, total_amount_cents, status
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let items = self.load_items(order_id).await?;
                Ok(Some(Self::row_to_order(&row, items)?))
            }
            None => Ok(None),
        }
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, order_date, last_status_change_at, total_amount_cents, status
            FROM orders
            WHERE user_id = $1
            ORDER BY order_date DESC
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in &rows {
            let order_id = OrderId::from_uuid(row.try_get::<Uuid, _>("id")?);
            let items = self.load_items(order_id).await?;
            orders.push(Self::row_to_order(row, items)?);
        }
        Ok(orders)
    }

    #[tracing::instrument(skip(self))]
    async fn update_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
        changed_at: DateTime<Utc>,
    ) -> Result<Order> {
        let row = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, last_status_change_at = $3
            WHERE id = $1
            RETURNING id, user_id, order_date, last_status_change_at, total_amount_cents, status
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(status.as_str())
        .bind(changed_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(OrderStoreError::OrderNotFound(order_id))?;

        let items = self.load_items(order_id).await?;
        Self::row_to_order(&row, items)
    }
}

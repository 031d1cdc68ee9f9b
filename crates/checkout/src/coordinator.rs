//! Checkout coordinator for orchestrating order placement.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::UserId;
use domain::{Cart, CartOwner, Order, OrderItem, OrderStatus, ProductId};
use order_store::OrderStore;
use tokio::sync::OwnedMutexGuard;

use crate::config::CheckoutConfig;
use crate::error::{CheckoutError, Result};
use crate::processor::PaymentProcessor;
use crate::services::audit::{
    ACTION_PLACE_ORDER_AWAITING_AUTHENTICATION, ACTION_PLACE_ORDER_COMPENSATED,
    ACTION_PLACE_ORDER_PAYMENT_FAILED, ACTION_PLACE_ORDER_SUCCESS, AuditRecord, AuditSink,
};
use crate::services::cart::CartStore;
use crate::services::gateway::{PaymentGateway, PaymentResult};
use crate::services::stock::StockLedger;

/// The response of a completed placement call: the persisted order plus the
/// payment outcome it settled on.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PlacementReceipt {
    /// The persisted order.
    pub order: Order,
    /// The payment outcome folded into it.
    pub payment: PaymentResult,
}

/// Orchestrates the placement of an order: cart snapshot, per-line stock
/// validation, payment with retry, conditional stock decrement, cart
/// clearing, and order persistence.
///
/// Placement is serialized per cart owner so a rapid double-submit cannot
/// double-charge. Once payment has captured, the remaining steps run on a
/// detached task: cancelling the caller cannot abandon a captured payment.
pub struct CheckoutCoordinator<C, L, G, A, R>
where
    C: CartStore,
    L: StockLedger,
    G: PaymentGateway,
    A: AuditSink,
    R: OrderStore,
{
    carts: C,
    stock: L,
    processor: Arc<PaymentProcessor<G>>,
    audit: A,
    orders: R,
    config: CheckoutConfig,
    placement_locks: Mutex<HashMap<CartOwner, Arc<tokio::sync::Mutex<()>>>>,
}

impl<C, L, G, A, R> CheckoutCoordinator<C, L, G, A, R>
where
    C: CartStore + Clone + 'static,
    L: StockLedger + Clone + 'static,
    G: PaymentGateway + Send + Sync + 'static,
    A: AuditSink + Clone + 'static,
    R: OrderStore + Clone + 'static,
{
    /// Creates a new coordinator with default configuration.
    pub fn new(carts: C, stock: L, gateway: G, audit: A, orders: R) -> Self {
        Self::with_config(carts, stock, gateway, audit, orders, CheckoutConfig::default())
    }

    /// Creates a new coordinator with the given configuration.
    pub fn with_config(
        carts: C,
        stock: L,
        gateway: G,
        audit: A,
        orders: R,
        config: CheckoutConfig,
    ) -> Self {
        let processor = PaymentProcessor::new(gateway)
            .with_backoff_unit(Duration::from_secs(config.backoff_unit_secs));
        Self {
            carts,
            stock,
            processor: Arc::new(processor),
            audit,
            orders,
            config,
            placement_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the payment processor, for receipt rendering and refunds.
    pub fn processor(&self) -> &PaymentProcessor<G> {
        &self.processor
    }

    /// Turns the user's cart into a paid order, or fails cleanly.
    ///
    /// Validation failures (`EmptyCart`, `ProductNotFound`,
    /// `InsufficientStock`) happen before any side effect. A definitive
    /// payment failure persists the order as `PaymentFailed` for the audit
    /// trail and fails with `PaymentFailed`; stock and cart are untouched.
    /// On success the order is persisted as `Processing`, stock is
    /// decremented, and the cart is cleared.
    #[tracing::instrument(skip(self, payment_token))]
    pub async fn place_order(
        &self,
        user_id: UserId,
        payment_token: &str,
    ) -> Result<PlacementReceipt> {
        let owner = CartOwner::User(user_id);
        let guard = self.placement_lock(&owner).lock_owned().await;
        let started = std::time::Instant::now();

        let (cart, order) = self.prepare(&owner, user_id).await?;

        let payment = self
            .processor
            .charge_with_retry(
                payment_token,
                order.total_amount(),
                self.config.max_payment_attempts,
            )
            .await?;

        let result = self.settle(owner, cart, order, payment, guard).await;
        metrics::histogram!("checkout_placement_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        result
    }

    /// Places an order through the 3-D Secure payment path.
    ///
    /// Performs exactly one charge attempt. When the gateway demands a
    /// challenge, the order persists in `Pending` awaiting out-of-band
    /// authentication, stock and cart stay untouched, and the receipt
    /// carries the redirect URL. Retry semantics are never applied here.
    #[tracing::instrument(skip(self, payment_token))]
    pub async fn place_order_with_3d_secure(
        &self,
        user_id: UserId,
        payment_token: &str,
        return_url: &str,
    ) -> Result<PlacementReceipt> {
        let owner = CartOwner::User(user_id);
        let guard = self.placement_lock(&owner).lock_owned().await;
        let started = std::time::Instant::now();

        let (cart, order) = self.prepare(&owner, user_id).await?;

        let payment = self
            .processor
            .charge_with_3d_secure(payment_token, order.total_amount(), return_url)
            .await?;

        let result = self.settle(owner, cart, order, payment, guard).await;
        metrics::histogram!("checkout_placement_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        result
    }

    /// Steps 1-4: cart snapshot, per-line validation, total, order shell.
    ///
    /// Validation covers every line before anything mutates, so a failure on
    /// a later line leaves nothing half-done.
    async fn prepare(&self, owner: &CartOwner, user_id: UserId) -> Result<(Cart, Order)> {
        let cart = self
            .carts
            .get_cart(owner)
            .await?
            .filter(|cart| !cart.is_empty())
            .ok_or(CheckoutError::EmptyCart)?;

        for line in cart.lines() {
            let product = self
                .stock
                .get_product(&line.product_id)
                .await?
                .ok_or_else(|| CheckoutError::ProductNotFound(line.product_id.clone()))?;

            if product.stock_quantity < line.quantity {
                return Err(CheckoutError::InsufficientStock {
                    product: product.name,
                });
            }
        }

        let items: Vec<OrderItem> = cart
            .lines()
            .iter()
            .map(|line| OrderItem::new(line.product_id.clone(), line.quantity, line.price_snapshot))
            .collect();

        // Total comes from the snapshot prices inside the items, not from
        // the live catalog prices read above.
        let order = Order::place(user_id, items)?;

        Ok((cart, order))
    }

    /// Folds the payment outcome into the order and finishes placement.
    async fn settle(
        &self,
        owner: CartOwner,
        cart: Cart,
        mut order: Order,
        payment: PaymentResult,
        guard: OwnedMutexGuard<()>,
    ) -> Result<PlacementReceipt> {
        if payment.requires_3d_secure {
            // Awaiting out-of-band authentication: the order stays Pending
            // and nothing else moves until the challenge resolves.
            self.orders.insert(&order).await?;
            self.record_audit(
                AuditRecord::new(
                    ACTION_PLACE_ORDER_AWAITING_AUTHENTICATION,
                    "Order",
                    Some(order.id().to_string()),
                    Some(order.user_id()),
                    format!(
                        "3D Secure authentication required for {} (transaction {})",
                        order.total_amount(),
                        payment.transaction_id
                    ),
                )
                .with_metadata(serde_json::json!({
                    "transaction_id": &payment.transaction_id,
                    "redirect_url": &payment.redirect_url,
                })),
            )
            .await;

            tracing::info!(
                order_id = %order.id(),
                transaction_id = %payment.transaction_id,
                "order awaiting 3D Secure authentication"
            );
            return Ok(PlacementReceipt { order, payment });
        }

        if !payment.is_success {
            // A failed order is still persisted, for the audit trail.
            order.fail_payment()?;
            self.orders.insert(&order).await?;
            self.record_audit(
                AuditRecord::new(
                    ACTION_PLACE_ORDER_PAYMENT_FAILED,
                    "Order",
                    Some(order.id().to_string()),
                    Some(order.user_id()),
                    format!(
                        "Payment failed for {}: {}",
                        order.total_amount(),
                        payment.message
                    ),
                )
                .with_metadata(serde_json::json!({
                    "amount_cents": order.total_amount().cents(),
                })),
            )
            .await;

            tracing::warn!(
                order_id = %order.id(),
                amount = %order.total_amount(),
                message = %payment.message,
                "payment failed for order"
            );
            metrics::counter!("checkout_orders_payment_failed_total").increment(1);

            return Err(CheckoutError::PaymentFailed {
                message: payment.message,
            });
        }

        // Payment has captured. The remaining steps must complete even if
        // the caller goes away, so they run on a detached task; the owner
        // lock travels with it.
        let order_id = order.id();
        let transaction_id = payment.transaction_id.clone();

        let carts = self.carts.clone();
        let stock = self.stock.clone();
        let orders = self.orders.clone();
        let audit = self.audit.clone();
        let processor = Arc::clone(&self.processor);

        let task = tokio::spawn(async move {
            let _guard = guard;
            finalize_captured(carts, stock, orders, audit, processor, owner, cart, order, payment)
                .await
        });

        match task.await {
            Ok(result) => result,
            Err(join_error) => {
                tracing::error!(
                    %order_id,
                    %transaction_id,
                    %join_error,
                    "finalization task failed after payment capture"
                );
                metrics::counter!("checkout_fulfillment_failures_total").increment(1);
                Err(CheckoutError::FulfillmentInterrupted {
                    order_id,
                    transaction_id,
                    reason: format!("finalization task failed: {join_error}"),
                })
            }
        }
    }

    /// Records an audit entry; sink failures are logged and never propagate.
    async fn record_audit(&self, record: AuditRecord) {
        if let Err(error) = self.audit.record(record).await {
            tracing::warn!(%error, "audit sink failure ignored");
        }
    }

    fn placement_lock(&self, owner: &CartOwner) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.placement_locks.lock().unwrap();
        locks
            .entry(owner.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

/// Steps 6-9 for a captured payment: conditional stock decrement, cart
/// clear, order persistence, audit. Runs detached from the caller.
#[allow(clippy::too_many_arguments)]
async fn finalize_captured<C, L, G, A, R>(
    carts: C,
    stock: L,
    orders: R,
    audit: A,
    processor: Arc<PaymentProcessor<G>>,
    owner: CartOwner,
    cart: Cart,
    mut order: Order,
    payment: PaymentResult,
) -> Result<PlacementReceipt>
where
    C: CartStore,
    L: StockLedger,
    G: PaymentGateway,
    A: AuditSink,
    R: OrderStore,
{
    // Conditional decrement per line. The validation pass already approved
    // these quantities, but a concurrent order may have drained stock since;
    // the ledger is the arbiter.
    let mut decremented: Vec<(ProductId, u32)> = Vec::with_capacity(cart.line_count());
    for line in cart.lines() {
        match stock.decrement_stock(&line.product_id, line.quantity).await {
            Ok(()) => decremented.push((line.product_id.clone(), line.quantity)),
            Err(error) => {
                return compensate_capture(
                    &stock, &orders, &audit, &processor, &mut order, &payment, &decremented, error,
                )
                .await;
            }
        }
    }

    // Clear the cart. The payment has captured and stock is committed, so a
    // failing cart store must not sink the order; it is alarmed instead.
    if let Err(error) = carts.clear_cart(&owner).await {
        tracing::error!(
            order_id = %order.id(),
            transaction_id = %payment.transaction_id,
            %error,
            "cart clear failed after payment capture"
        );
        metrics::counter!("checkout_fulfillment_failures_total").increment(1);
    }

    order.transition(OrderStatus::Processing)?;

    if let Err(error) = orders.insert(&order).await {
        tracing::error!(
            order_id = %order.id(),
            transaction_id = %payment.transaction_id,
            %error,
            "order persistence failed after payment capture"
        );
        metrics::counter!("checkout_fulfillment_failures_total").increment(1);
        return Err(CheckoutError::FulfillmentInterrupted {
            order_id: order.id(),
            transaction_id: payment.transaction_id.clone(),
            reason: error.to_string(),
        });
    }

    if let Err(error) = audit
        .record(
            AuditRecord::new(
                ACTION_PLACE_ORDER_SUCCESS,
                "Order",
                Some(order.id().to_string()),
                Some(order.user_id()),
                format!(
                    "Order placed for {} (transaction {})",
                    order.total_amount(),
                    payment.transaction_id
                ),
            )
            .with_metadata(serde_json::json!({
                "transaction_id": &payment.transaction_id,
                "amount_cents": order.total_amount().cents(),
            })),
        )
        .await
    {
        tracing::warn!(%error, "audit sink failure ignored");
    }

    tracing::info!(
        order_id = %order.id(),
        transaction_id = %payment.transaction_id,
        "order placed successfully"
    );
    metrics::counter!("checkout_orders_placed_total").increment(1);

    Ok(PlacementReceipt { order, payment })
}

/// Compensation for a decrement failure after payment capture: release the
/// lines already taken, refund the transaction, and persist the order as
/// `Cancelled` so the attempt is not silently lost.
#[allow(clippy::too_many_arguments)]
async fn compensate_capture<L, G, A, R>(
    stock: &L,
    orders: &R,
    audit: &A,
    processor: &PaymentProcessor<G>,
    order: &mut Order,
    payment: &PaymentResult,
    decremented: &[(ProductId, u32)],
    cause: CheckoutError,
) -> Result<PlacementReceipt>
where
    L: StockLedger,
    G: PaymentGateway,
    A: AuditSink,
    R: OrderStore,
{
    tracing::warn!(
        order_id = %order.id(),
        transaction_id = %payment.transaction_id,
        %cause,
        "compensating captured payment"
    );

    for (product_id, quantity) in decremented {
        if let Err(error) = stock.release_stock(product_id, *quantity).await {
            tracing::error!(%product_id, quantity = *quantity, %error, "stock release failed during compensation");
            metrics::counter!("checkout_fulfillment_failures_total").increment(1);
        }
    }

    if let Err(error) = processor.refund(&payment.transaction_id).await {
        // Money is now captured with no order to show for it; this is the
        // alarm an operator must act on.
        tracing::error!(
            order_id = %order.id(),
            transaction_id = %payment.transaction_id,
            %error,
            "refund failed during compensation"
        );
        metrics::counter!("checkout_fulfillment_failures_total").increment(1);
        return Err(CheckoutError::FulfillmentInterrupted {
            order_id: order.id(),
            transaction_id: payment.transaction_id.clone(),
            reason: format!("refund failed during compensation: {error}"),
        });
    }

    if let Err(error) = order.transition(OrderStatus::Cancelled) {
        tracing::error!(order_id = %order.id(), %error, "cancel transition failed during compensation");
    } else if let Err(error) = orders.insert(order).await {
        tracing::error!(order_id = %order.id(), %error, "cancelled order persistence failed");
        metrics::counter!("checkout_fulfillment_failures_total").increment(1);
    }

    if let Err(error) = audit
        .record(
            AuditRecord::new(
                ACTION_PLACE_ORDER_COMPENSATED,
                "Order",
                Some(order.id().to_string()),
                Some(order.user_id()),
                format!(
                    "Captured payment {} refunded: {}",
                    payment.transaction_id, cause
                ),
            )
            .with_metadata(serde_json::json!({
                "transaction_id": &payment.transaction_id,
            })),
        )
        .await
    {
        tracing::warn!(%error, "audit sink failure ignored");
    }

    metrics::counter!("checkout_placements_compensated_total").increment(1);
    Err(cause)
}

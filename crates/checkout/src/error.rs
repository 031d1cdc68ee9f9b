//! Checkout error types.

use common::OrderId;
use domain::{OrderError, ProductId};
use order_store::OrderStoreError;
use thiserror::Error;

/// Errors that can occur during checkout operations.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The cart does not exist or has no lines.
    #[error("Cannot place order with empty cart")]
    EmptyCart,

    /// A cart line references a product no longer in the catalog.
    #[error("Product with ID {0} not found")]
    ProductNotFound(ProductId),

    /// Requested quantity exceeds available stock.
    #[error("Insufficient stock for product {product}")]
    InsufficientStock { product: String },

    /// Payment was declined or exhausted its retries.
    #[error("Payment failed: {message}")]
    PaymentFailed { message: String },

    /// A charge request violated the processor's input contract.
    #[error("Invalid charge request: {reason}")]
    InvalidChargeRequest { reason: &'static str },

    /// Order not found.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// Payment was captured but fulfillment could not complete.
    ///
    /// This is the severe post-capture failure class: money has moved and
    /// the error carries the ids an operator needs to reconcile.
    #[error(
        "Fulfillment interrupted after payment capture for order {order_id} \
         (transaction {transaction_id}): {reason}"
    )]
    FulfillmentInterrupted {
        order_id: OrderId,
        transaction_id: String,
        reason: String,
    },

    /// Cart store error.
    #[error("Cart store error: {0}")]
    CartStore(String),

    /// Stock ledger error.
    #[error("Stock ledger error: {0}")]
    StockLedger(String),

    /// Domain error.
    #[error("Domain error: {0}")]
    Domain(#[from] OrderError),

    /// Order store error.
    #[error("Order store error: {0}")]
    Store(#[from] OrderStoreError),
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;

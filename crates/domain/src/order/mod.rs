//! Order entity and related types.

mod cart;
mod entity;
mod status;
mod value_objects;

pub use cart::{Cart, CartLine, CartOwner};
pub use entity::Order;
pub use status::OrderStatus;
pub use value_objects::{Money, OrderItem, ProductId};

use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The status text is not one of the known status literals.
    #[error("Invalid order status: {status}")]
    InvalidStatus { status: String },

    /// The requested status change is not in the transition table.
    #[error("Cannot transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// An order must contain at least one item.
    #[error("Order has no items")]
    NoItems,

    /// Line quantity must be at least one.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// Line price must be positive.
    #[error("Invalid price: {price} (must be greater than 0)")]
    InvalidPrice { price: i64 },

    /// A payment outcome can only be folded into a freshly placed order.
    #[error("Payment outcome can only be recorded on a {expected} order, found {actual}")]
    PaymentOutcomeNotApplicable {
        expected: OrderStatus,
        actual: OrderStatus,
    },
}

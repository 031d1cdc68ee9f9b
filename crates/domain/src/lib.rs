//! Domain layer for the commerce workspace.
//!
//! This crate provides the pure order domain:
//! - Money and product value objects
//! - Cart snapshot types consumed by order placement
//! - The Order entity with its frozen line items
//! - The OrderStatus state machine with its transition table
//!
//! No I/O lives here; persistence and orchestration build on top of it.

pub mod order;

pub use order::{
    Cart, CartLine, CartOwner, Money, Order, OrderError, OrderItem, OrderStatus, ProductId,
};

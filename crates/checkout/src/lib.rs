//! Order placement workflow for the commerce workspace.
//!
//! This crate turns a pending cart into a paid order, or fails cleanly:
//! 1. Snapshot the cart
//! 2. Validate every line against the stock ledger
//! 3. Compute the total from the cart's price snapshots
//! 4. Build the order shell
//! 5. Charge payment with bounded retries and exponential backoff
//! 6. Conditionally decrement stock
//! 7. Clear the cart
//! 8. Persist the order as Processing
//! 9. Record the outcome in the audit trail
//!
//! Validation failures happen before any side effect; a definitive payment
//! failure still persists the order (as `PaymentFailed`) for the audit
//! trail; once payment has captured, the remaining steps run to completion
//! regardless of caller cancellation.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod orders;
pub mod processor;
pub mod services;

pub use config::CheckoutConfig;
pub use coordinator::{CheckoutCoordinator, PlacementReceipt};
pub use error::{CheckoutError, Result};
pub use orders::OrderService;
pub use processor::PaymentProcessor;
pub use services::{
    AuditError, AuditRecord, AuditSink, CartStore, ChargeOutcome, GatewayError,
    InMemoryAuditSink, InMemoryCartStore, InMemoryPaymentGateway, InMemoryStockLedger,
    PaymentGateway, PaymentResult, Product, StockLedger,
};

//! Collaborator traits and in-memory implementations for the checkout workflow.

pub mod audit;
pub mod cart;
pub mod gateway;
pub mod stock;

pub use audit::{AuditError, AuditRecord, AuditSink, InMemoryAuditSink};
pub use cart::{CartStore, InMemoryCartStore};
pub use gateway::{ChargeOutcome, GatewayError, InMemoryPaymentGateway, PaymentGateway, PaymentResult};
pub use stock::{InMemoryStockLedger, Product, StockLedger};

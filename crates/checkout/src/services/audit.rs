//! Audit sink trait and in-memory implementation.
//!
//! The workflow records placement outcomes here for compliance. Audit is
//! best-effort observability: sink failures are logged by the caller and
//! never abort an otherwise-successful order.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::UserId;
use serde::Serialize;
use thiserror::Error;

/// Audit action: order placed and paid.
pub const ACTION_PLACE_ORDER_SUCCESS: &str = "PLACE_ORDER_SUCCESS";

/// Audit action: order persisted with a failed payment.
pub const ACTION_PLACE_ORDER_PAYMENT_FAILED: &str = "PLACE_ORDER_PAYMENT_FAILED";

/// Audit action: order awaiting 3-D Secure authentication.
pub const ACTION_PLACE_ORDER_AWAITING_AUTHENTICATION: &str =
    "PLACE_ORDER_AWAITING_AUTHENTICATION";

/// Audit action: captured payment refunded during compensation.
pub const ACTION_PLACE_ORDER_COMPENSATED: &str = "PLACE_ORDER_COMPENSATED";

/// Audit action: order status changed through the state machine.
pub const ACTION_UPDATE_ORDER_STATUS: &str = "UPDATE_ORDER_STATUS";

/// One audit trail entry.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    /// What happened (one of the `ACTION_*` constants).
    pub action: String,
    /// Entity type the record concerns.
    pub entity: String,
    /// Entity identifier, when one exists.
    pub entity_id: Option<String>,
    /// Acting user, when known.
    pub user_id: Option<UserId>,
    /// Free-form detail line.
    pub details: String,
    /// Structured context for downstream tooling.
    pub metadata: serde_json::Value,
    /// When the record was produced.
    pub recorded_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Creates a new audit record stamped with the current time.
    pub fn new(
        action: &str,
        entity: &str,
        entity_id: Option<String>,
        user_id: Option<UserId>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            action: action.to_string(),
            entity: entity.to_string(),
            entity_id,
            user_id,
            details: details.into(),
            metadata: serde_json::Value::Null,
            recorded_at: Utc::now(),
        }
    }

    /// Attaches structured metadata to the record.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Error raised by a failing audit sink.
#[derive(Debug, Error)]
#[error("Audit sink error: {0}")]
pub struct AuditError(pub String);

/// Trait for compliance audit sinks.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Records one audit entry.
    async fn record(&self, record: AuditRecord) -> Result<(), AuditError>;
}

#[derive(Debug, Default)]
struct InMemoryAuditState {
    records: Vec<AuditRecord>,
    fail: bool,
}

/// In-memory audit sink for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAuditSink {
    state: Arc<RwLock<InMemoryAuditState>>,
}

impl InMemoryAuditSink {
    /// Creates a new in-memory audit sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the sink to fail every record call.
    pub fn set_fail(&self, fail: bool) {
        self.state.write().unwrap().fail = fail;
    }

    /// Returns the number of recorded entries.
    pub fn record_count(&self) -> usize {
        self.state.read().unwrap().records.len()
    }

    /// Returns the recorded actions, in order.
    pub fn actions(&self) -> Vec<String> {
        self.state
            .read()
            .unwrap()
            .records
            .iter()
            .map(|r| r.action.clone())
            .collect()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn record(&self, record: AuditRecord) -> Result<(), AuditError> {
        let mut state = self.state.write().unwrap();

        if state.fail {
            return Err(AuditError("audit sink unavailable".to_string()));
        }

        state.records.push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_and_count() {
        let sink = InMemoryAuditSink::new();

        sink.record(AuditRecord::new(
            ACTION_PLACE_ORDER_SUCCESS,
            "Order",
            Some("abc".to_string()),
            Some(UserId::new()),
            "placed",
        ))
        .await
        .unwrap();

        assert_eq!(sink.record_count(), 1);
        assert_eq!(sink.actions(), vec![ACTION_PLACE_ORDER_SUCCESS.to_string()]);
    }

    #[tokio::test]
    async fn test_fail_toggle() {
        let sink = InMemoryAuditSink::new();
        sink.set_fail(true);

        let result = sink
            .record(AuditRecord::new(
                ACTION_PLACE_ORDER_SUCCESS,
                "Order",
                None,
                None,
                "placed",
            ))
            .await;

        assert!(result.is_err());
        assert_eq!(sink.record_count(), 0);
    }
}

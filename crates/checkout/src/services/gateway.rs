//! Payment gateway trait and in-memory implementation.

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::Money;
use serde::Serialize;
use thiserror::Error;

/// Outcome of one charge attempt against the gateway.
///
/// Transient; folded into the order status and the placement response, never
/// persisted as its own entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentResult {
    /// Whether the charge captured.
    pub is_success: bool,
    /// Gateway transaction identifier (empty when no attempt captured).
    pub transaction_id: String,
    /// Human-readable outcome message.
    pub message: String,
    /// The amount the charge was for.
    pub amount: Money,
    /// Payment method label.
    pub payment_method: String,
    /// When the result was produced.
    pub processed_at: DateTime<Utc>,
    /// Set when the gateway demands a 3-D Secure challenge.
    pub requires_3d_secure: bool,
    /// Where the client must go to complete the challenge.
    pub redirect_url: Option<String>,
}

impl PaymentResult {
    /// A captured charge.
    pub fn success(transaction_id: impl Into<String>, amount: Money) -> Self {
        Self {
            is_success: true,
            transaction_id: transaction_id.into(),
            message: "Payment processed successfully".to_string(),
            amount,
            payment_method: "Card".to_string(),
            processed_at: Utc::now(),
            requires_3d_secure: false,
            redirect_url: None,
        }
    }

    /// A declined charge.
    pub fn declined(
        transaction_id: impl Into<String>,
        message: impl Into<String>,
        amount: Money,
    ) -> Self {
        Self {
            is_success: false,
            transaction_id: transaction_id.into(),
            message: message.into(),
            amount,
            payment_method: "Card".to_string(),
            processed_at: Utc::now(),
            requires_3d_secure: false,
            redirect_url: None,
        }
    }

    /// The synthetic result returned when every retry attempt failed.
    pub fn failed_after_retries(amount: Money) -> Self {
        Self {
            is_success: false,
            transaction_id: String::new(),
            message: "Payment failed after multiple attempts. Please try again later."
                .to_string(),
            amount,
            payment_method: "Unknown".to_string(),
            processed_at: Utc::now(),
            requires_3d_secure: false,
            redirect_url: None,
        }
    }

    /// A charge held pending an out-of-band 3-D Secure challenge.
    pub fn authentication_required(
        transaction_id: impl Into<String>,
        amount: Money,
        redirect_url: impl Into<String>,
    ) -> Self {
        Self {
            is_success: false,
            transaction_id: transaction_id.into(),
            message: "3D Secure authentication required".to_string(),
            amount,
            payment_method: "Card".to_string(),
            processed_at: Utc::now(),
            requires_3d_secure: true,
            redirect_url: Some(redirect_url.into()),
        }
    }
}

/// Transient errors a gateway call may raise.
///
/// These are retryable from the processor's point of view and never reach
/// the workflow caller directly.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Network-level failure reaching the gateway.
    #[error("Payment gateway transport error: {0}")]
    Transport(String),

    /// The gateway did not answer in time.
    #[error("Payment gateway timed out")]
    Timeout,
}

/// Trait for payment gateway operations.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Charges a payment token for an amount.
    async fn charge(&self, token: &str, amount: Money) -> Result<PaymentResult, GatewayError>;

    /// Charges with 3-D Secure: a challenge-requiring card yields a result
    /// carrying `requires_3d_secure` and a redirect URL instead of a decline.
    async fn charge_with_3d_secure(
        &self,
        token: &str,
        amount: Money,
        return_url: &str,
    ) -> Result<PaymentResult, GatewayError>;

    /// Refunds a previously captured transaction.
    async fn refund(&self, transaction_id: &str) -> Result<(), GatewayError>;
}

/// Scripted outcome for one in-memory charge attempt.
#[derive(Debug, Clone)]
pub enum ChargeOutcome {
    /// The charge captures.
    Approve,
    /// The gateway answers with a decline.
    Decline(String),
    /// The call raises a transient error.
    Fault(String),
    /// The gateway demands a 3-D Secure challenge at the given URL.
    RequireAuthentication(String),
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    script: VecDeque<ChargeOutcome>,
    charges: Vec<Money>,
    captured: Vec<String>,
    refunded: Vec<String>,
    next_id: u32,
    fail_on_refund: bool,
}

/// In-memory payment gateway for testing.
///
/// Charge outcomes follow a script queue; once the script drains, every
/// charge captures.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<RwLock<InMemoryGatewayState>>,
}

impl InMemoryPaymentGateway {
    /// Creates a gateway that approves every charge.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a gateway that plays the given outcomes in order.
    pub fn with_script(outcomes: impl IntoIterator<Item = ChargeOutcome>) -> Self {
        let gateway = Self::default();
        gateway.state.write().unwrap().script = outcomes.into_iter().collect();
        gateway
    }

    /// Appends outcomes to the script.
    pub fn push_outcomes(&self, outcomes: impl IntoIterator<Item = ChargeOutcome>) {
        self.state.write().unwrap().script.extend(outcomes);
    }

    /// Configures the gateway to fail refund calls.
    pub fn set_fail_on_refund(&self, fail: bool) {
        self.state.write().unwrap().fail_on_refund = fail;
    }

    /// Returns the number of charge attempts made.
    pub fn charge_count(&self) -> usize {
        self.state.read().unwrap().charges.len()
    }

    /// Returns the amounts of all charge attempts, in order.
    pub fn charged_amounts(&self) -> Vec<Money> {
        self.state.read().unwrap().charges.clone()
    }

    /// Returns the number of captured (not refunded) transactions.
    pub fn captured_count(&self) -> usize {
        let state = self.state.read().unwrap();
        state
            .captured
            .iter()
            .filter(|id| !state.refunded.contains(id))
            .count()
    }

    /// Returns the number of refunds issued.
    pub fn refund_count(&self) -> usize {
        self.state.read().unwrap().refunded.len()
    }

    fn play(&self, amount: Money) -> Result<PaymentResult, GatewayError> {
        let mut state = self.state.write().unwrap();
        state.charges.push(amount);

        let outcome = state.script.pop_front().unwrap_or(ChargeOutcome::Approve);
        match outcome {
            ChargeOutcome::Approve => {
                state.next_id += 1;
                let transaction_id = format!("txn_{:04}", state.next_id);
                state.captured.push(transaction_id.clone());
                Ok(PaymentResult::success(transaction_id, amount))
            }
            ChargeOutcome::Decline(message) => {
                state.next_id += 1;
                let transaction_id = format!("txn_{:04}", state.next_id);
                Ok(PaymentResult::declined(transaction_id, message, amount))
            }
            ChargeOutcome::Fault(message) => Err(GatewayError::Transport(message)),
            ChargeOutcome::RequireAuthentication(redirect_url) => {
                state.next_id += 1;
                let transaction_id = format!("txn_{:04}", state.next_id);
                Ok(PaymentResult::authentication_required(
                    transaction_id,
                    amount,
                    redirect_url,
                ))
            }
        }
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn charge(&self, _token: &str, amount: Money) -> Result<PaymentResult, GatewayError> {
        self.play(amount)
    }

    async fn charge_with_3d_secure(
        &self,
        _token: &str,
        amount: Money,
        _return_url: &str,
    ) -> Result<PaymentResult, GatewayError> {
        self.play(amount)
    }

    async fn refund(&self, transaction_id: &str) -> Result<(), GatewayError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_refund {
            return Err(GatewayError::Transport(
                "refund endpoint unavailable".to_string(),
            ));
        }

        state.refunded.push(transaction_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_gateway_approves() {
        let gateway = InMemoryPaymentGateway::new();
        let result = gateway
            .charge("tok_visa", Money::from_cents(5000))
            .await
            .unwrap();

        assert!(result.is_success);
        assert_eq!(result.transaction_id, "txn_0001");
        assert_eq!(result.amount.cents(), 5000);
        assert_eq!(gateway.charge_count(), 1);
        assert_eq!(gateway.captured_count(), 1);
    }

    #[tokio::test]
    async fn test_scripted_outcomes_play_in_order() {
        let gateway = InMemoryPaymentGateway::with_script([
            ChargeOutcome::Decline("card declined".to_string()),
            ChargeOutcome::Fault("connection reset".to_string()),
            ChargeOutcome::Approve,
        ]);
        let amount = Money::from_cents(1000);

        let first = gateway.charge("tok", amount).await.unwrap();
        assert!(!first.is_success);
        assert_eq!(first.message, "card declined");

        let second = gateway.charge("tok", amount).await;
        assert!(matches!(second, Err(GatewayError::Transport(_))));

        let third = gateway.charge("tok", amount).await.unwrap();
        assert!(third.is_success);

        assert_eq!(gateway.charge_count(), 3);
    }

    #[tokio::test]
    async fn test_authentication_outcome() {
        let gateway = InMemoryPaymentGateway::with_script([ChargeOutcome::RequireAuthentication(
            "https://gateway.test/3ds/123".to_string(),
        )]);

        let result = gateway
            .charge_with_3d_secure("tok", Money::from_cents(1000), "https://shop.test/checkout")
            .await
            .unwrap();

        assert!(!result.is_success);
        assert!(result.requires_3d_secure);
        assert_eq!(
            result.redirect_url.as_deref(),
            Some("https://gateway.test/3ds/123")
        );
    }

    #[tokio::test]
    async fn test_refund_releases_capture() {
        let gateway = InMemoryPaymentGateway::new();
        let result = gateway
            .charge("tok", Money::from_cents(1000))
            .await
            .unwrap();
        assert_eq!(gateway.captured_count(), 1);

        gateway.refund(&result.transaction_id).await.unwrap();
        assert_eq!(gateway.captured_count(), 0);
        assert_eq!(gateway.refund_count(), 1);
    }

    #[tokio::test]
    async fn test_fail_on_refund() {
        let gateway = InMemoryPaymentGateway::new();
        gateway.set_fail_on_refund(true);
        assert!(gateway.refund("txn_0001").await.is_err());
    }

    #[tokio::test]
    async fn test_synthetic_failure_shape() {
        let result = PaymentResult::failed_after_retries(Money::from_cents(5998));
        assert!(!result.is_success);
        assert!(result.transaction_id.is_empty());
        assert_eq!(result.payment_method, "Unknown");
        assert_eq!(
            result.message,
            "Payment failed after multiple attempts. Please try again later."
        );
    }
}

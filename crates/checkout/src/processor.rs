//! Payment processing with bounded retries and exponential backoff.

use std::time::Duration;

use domain::{Money, Order};

use crate::error::{CheckoutError, Result};
use crate::services::gateway::{GatewayError, PaymentGateway, PaymentResult};

/// Retry/backoff wrapper around a payment gateway.
///
/// Masks transient gateway failures from the caller while still surfacing a
/// definitive final failure. Declines and raised gateway errors are treated
/// identically by the retry loop.
pub struct PaymentProcessor<G> {
    gateway: G,
    backoff_unit: Duration,
}

impl<G: PaymentGateway> PaymentProcessor<G> {
    /// Creates a new processor with a one-second backoff unit.
    pub fn new(gateway: G) -> Self {
        Self {
            gateway,
            backoff_unit: Duration::from_secs(1),
        }
    }

    /// Overrides the backoff unit. The delay before retry `n` is
    /// `unit * 2^n` with `n` counted from 1.
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    /// Charges a payment token, retrying declined or faulted attempts.
    ///
    /// Returns a successful result as soon as an attempt captures. When all
    /// attempts fail, returns the synthetic exhaustion result rather than an
    /// error; the only error this method produces is a violated input
    /// contract, raised before the first gateway call.
    #[tracing::instrument(skip(self, token))]
    pub async fn charge_with_retry(
        &self,
        token: &str,
        amount: Money,
        max_attempts: u32,
    ) -> Result<PaymentResult> {
        if token.is_empty() {
            return Err(CheckoutError::InvalidChargeRequest {
                reason: "payment token must not be empty",
            });
        }
        if !amount.is_positive() {
            return Err(CheckoutError::InvalidChargeRequest {
                reason: "charge amount must be positive",
            });
        }
        if max_attempts == 0 {
            return Err(CheckoutError::InvalidChargeRequest {
                reason: "max_attempts must be at least 1",
            });
        }

        for attempt in 1..=max_attempts {
            tracing::info!(attempt, max_attempts, %amount, "processing payment attempt");
            metrics::counter!("checkout_payment_attempts_total").increment(1);

            match self.gateway.charge(token, amount).await {
                Ok(result) if result.is_success => {
                    tracing::info!(
                        attempt,
                        transaction_id = %result.transaction_id,
                        "payment processed successfully"
                    );
                    return Ok(result);
                }
                Ok(result) => {
                    tracing::warn!(attempt, message = %result.message, "payment attempt declined");
                }
                Err(error) => {
                    tracing::error!(attempt, %error, "payment attempt failed with gateway error");
                }
            }

            if attempt < max_attempts {
                let delay = self.backoff_unit * 2u32.pow(attempt);
                tracing::info!(delay_secs = delay.as_secs_f64(), "waiting before payment retry");
                tokio::time::sleep(delay).await;
            }
        }

        tracing::error!(max_attempts, %amount, "all payment attempts failed");
        metrics::counter!("checkout_payment_retries_exhausted_total").increment(1);

        Ok(PaymentResult::failed_after_retries(amount))
    }

    /// Charges through the 3-D Secure path: exactly one attempt, no retry.
    ///
    /// A challenge-requiring card yields a result with `requires_3d_secure`
    /// and the redirect URL. Retrying a 3-D Secure challenge is never
    /// correct, so gateway errors on this path fold into a failure result
    /// instead of re-entering the retry loop.
    #[tracing::instrument(skip(self, token))]
    pub async fn charge_with_3d_secure(
        &self,
        token: &str,
        amount: Money,
        return_url: &str,
    ) -> Result<PaymentResult> {
        if token.is_empty() {
            return Err(CheckoutError::InvalidChargeRequest {
                reason: "payment token must not be empty",
            });
        }
        if !amount.is_positive() {
            return Err(CheckoutError::InvalidChargeRequest {
                reason: "charge amount must be positive",
            });
        }

        match self
            .gateway
            .charge_with_3d_secure(token, amount, return_url)
            .await
        {
            Ok(result) => {
                if result.requires_3d_secure {
                    tracing::info!(
                        transaction_id = %result.transaction_id,
                        "3D Secure authentication required"
                    );
                }
                Ok(result)
            }
            Err(error) => {
                tracing::error!(%error, "3D Secure charge failed with gateway error");
                Ok(PaymentResult::declined(
                    "",
                    format!("Payment failed: {error}"),
                    amount,
                ))
            }
        }
    }

    /// Refunds a previously captured transaction.
    pub async fn refund(&self, transaction_id: &str) -> std::result::Result<(), GatewayError> {
        self.gateway.refund(transaction_id).await
    }

    /// Renders a plain-text receipt for a processed payment.
    pub fn receipt(&self, payment: &PaymentResult, order: &Order) -> String {
        format!(
            "\nPayment Receipt\n===============\n\
             Transaction ID: {}\n\
             Date: {}\n\
             Order ID: {}\n\
             Amount: {}\n\
             Payment Method: {}\n\
             Status: {}\n\
             Message: {}\n\n\
             Thank you for your purchase!\n",
            payment.transaction_id,
            payment.processed_at.format("%Y-%m-%d %H:%M:%S"),
            order.id(),
            payment.amount,
            payment.payment_method,
            if payment.is_success { "SUCCESS" } else { "FAILED" },
            payment.message,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::gateway::{ChargeOutcome, InMemoryPaymentGateway};
    use common::UserId;
    use domain::OrderItem;

    fn processor_with(
        outcomes: impl IntoIterator<Item = ChargeOutcome>,
    ) -> (PaymentProcessor<InMemoryPaymentGateway>, InMemoryPaymentGateway) {
        let gateway = InMemoryPaymentGateway::with_script(outcomes);
        (PaymentProcessor::new(gateway.clone()), gateway)
    }

    #[tokio::test]
    async fn test_first_attempt_success_makes_one_call() {
        let (processor, gateway) = processor_with([ChargeOutcome::Approve]);

        let result = processor
            .charge_with_retry("tok_visa", Money::from_cents(5000), 3)
            .await
            .unwrap();

        assert!(result.is_success);
        assert_eq!(gateway.charge_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_then_succeed_with_backoff() {
        let (processor, gateway) = processor_with([
            ChargeOutcome::Decline("card declined".to_string()),
            ChargeOutcome::Fault("connection reset".to_string()),
            ChargeOutcome::Approve,
        ]);

        let started = tokio::time::Instant::now();
        let result = processor
            .charge_with_retry("tok_visa", Money::from_cents(5998), 3)
            .await
            .unwrap();

        assert!(result.is_success);
        assert_eq!(result.transaction_id, "txn_0003");
        assert_eq!(gateway.charge_count(), 3);
        // Two backoff delays: 2s after attempt 1, 4s after attempt 2.
        assert_eq!(started.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_synthetic_failure() {
        let (processor, gateway) = processor_with([
            ChargeOutcome::Decline("declined".to_string()),
            ChargeOutcome::Decline("declined".to_string()),
            ChargeOutcome::Decline("declined".to_string()),
        ]);

        let started = tokio::time::Instant::now();
        let result = processor
            .charge_with_retry("tok_visa", Money::from_cents(1000), 3)
            .await
            .unwrap();

        assert!(!result.is_success);
        assert_eq!(
            result.message,
            "Payment failed after multiple attempts. Please try again later."
        );
        assert!(result.transaction_id.is_empty());
        assert_eq!(result.payment_method, "Unknown");
        assert_eq!(result.amount.cents(), 1000);
        assert_eq!(gateway.charge_count(), 3);
        // No delay after the final attempt.
        assert_eq!(started.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_attempt_has_no_delay() {
        let (processor, gateway) =
            processor_with([ChargeOutcome::Decline("declined".to_string())]);

        let started = tokio::time::Instant::now();
        let result = processor
            .charge_with_retry("tok_visa", Money::from_cents(1000), 1)
            .await
            .unwrap();

        assert!(!result.is_success);
        assert_eq!(gateway.charge_count(), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_gateway_errors_never_escape() {
        let (processor, gateway) = processor_with([
            ChargeOutcome::Fault("boom".to_string()),
            ChargeOutcome::Fault("boom".to_string()),
        ]);
        let processor = processor.with_backoff_unit(Duration::from_millis(1));

        let result = processor
            .charge_with_retry("tok_visa", Money::from_cents(1000), 2)
            .await
            .unwrap();

        assert!(!result.is_success);
        assert_eq!(gateway.charge_count(), 2);
    }

    #[tokio::test]
    async fn test_empty_token_rejected_before_gateway() {
        let (processor, gateway) = processor_with([]);

        let result = processor
            .charge_with_retry("", Money::from_cents(1000), 3)
            .await;

        assert!(matches!(
            result,
            Err(CheckoutError::InvalidChargeRequest { .. })
        ));
        assert_eq!(gateway.charge_count(), 0);
    }

    #[tokio::test]
    async fn test_non_positive_amount_rejected() {
        let (processor, _) = processor_with([]);
        let result = processor.charge_with_retry("tok", Money::zero(), 3).await;
        assert!(matches!(
            result,
            Err(CheckoutError::InvalidChargeRequest { .. })
        ));
    }

    #[tokio::test]
    async fn test_zero_attempts_rejected() {
        let (processor, _) = processor_with([]);
        let result = processor
            .charge_with_retry("tok", Money::from_cents(1000), 0)
            .await;
        assert!(matches!(
            result,
            Err(CheckoutError::InvalidChargeRequest { .. })
        ));
    }

    #[tokio::test]
    async fn test_3d_secure_single_attempt_no_retry() {
        let (processor, gateway) = processor_with([ChargeOutcome::RequireAuthentication(
            "https://gateway.test/3ds/1".to_string(),
        )]);

        let result = processor
            .charge_with_3d_secure(
                "tok_visa",
                Money::from_cents(1000),
                "https://shop.test/checkout",
            )
            .await
            .unwrap();

        assert!(result.requires_3d_secure);
        assert_eq!(
            result.redirect_url.as_deref(),
            Some("https://gateway.test/3ds/1")
        );
        assert_eq!(gateway.charge_count(), 1);
    }

    #[tokio::test]
    async fn test_3d_secure_folds_gateway_error_into_failure() {
        let (processor, gateway) =
            processor_with([ChargeOutcome::Fault("connection reset".to_string())]);

        let result = processor
            .charge_with_3d_secure("tok_visa", Money::from_cents(1000), "https://shop.test")
            .await
            .unwrap();

        assert!(!result.is_success);
        assert!(!result.requires_3d_secure);
        assert!(result.message.starts_with("Payment failed:"));
        assert_eq!(gateway.charge_count(), 1);
    }

    #[tokio::test]
    async fn test_receipt_contains_transaction_details() {
        let (processor, _) = processor_with([]);
        let order = Order::place(
            UserId::new(),
            vec![OrderItem::new("SKU-001", 2, Money::from_cents(2999))],
        )
        .unwrap();
        let payment = PaymentResult::success("txn_0042", order.total_amount());

        let receipt = processor.receipt(&payment, &order);

        assert!(receipt.contains("txn_0042"));
        assert!(receipt.contains(&order.id().to_string()));
        assert!(receipt.contains("$59.98"));
        assert!(receipt.contains("SUCCESS"));
    }
}

//! Checkout configuration loaded from environment variables.

/// Checkout settings with sensible defaults.
///
/// Reads from environment variables:
/// - `CHECKOUT_MAX_PAYMENT_ATTEMPTS` — payment attempts per placement (default: `3`)
/// - `CHECKOUT_BACKOFF_UNIT_SECS` — backoff unit in seconds; the delay before
///   retry `n` is `unit * 2^n` (default: `1`)
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    pub max_payment_attempts: u32,
    pub backoff_unit_secs: u64,
}

impl CheckoutConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            max_payment_attempts: std::env::var("CHECKOUT_MAX_PAYMENT_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
            backoff_unit_secs: std::env::var("CHECKOUT_BACKOFF_UNIT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1),
        }
    }
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            max_payment_attempts: 3,
            backoff_unit_secs: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = CheckoutConfig::default();
        assert_eq!(config.max_payment_attempts, 3);
        assert_eq!(config.backoff_unit_secs, 1);
    }
}

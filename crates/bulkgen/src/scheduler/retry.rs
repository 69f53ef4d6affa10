use std::time::Duration;

use crate::generator::GenerationError;

/// Backoff schedule for transient provider failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; a row makes at most `max_retries + 1` calls.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Whether a row that has already been retried `retries` times should try again.
    pub fn should_retry(&self, error: &GenerationError, retries: u32) -> bool {
        error.is_transient() && retries < self.max_retries
    }

    /// Wait before retry number `retry` (1-based): `base * 2^(retry - 1)`,
    /// raised to the provider's hint if longer, never above `max_delay`.
    pub fn delay_for(&self, retry: u32, hint: Option<Duration>) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        let computed = self.base_delay.saturating_mul(1u32 << exponent);
        computed.max(hint.unwrap_or_default()).min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_then_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1, None), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2, None), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(4, None), Duration::from_millis(4000));
        assert_eq!(policy.delay_for(5, None), Duration::from_secs(8));
        assert_eq!(policy.delay_for(40, None), Duration::from_secs(8));
    }

    #[test]
    fn test_retry_after_hint_is_honored_but_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.delay_for(1, Some(Duration::from_secs(3))),
            Duration::from_secs(3)
        );
        assert_eq!(
            policy.delay_for(1, Some(Duration::from_millis(10))),
            Duration::from_millis(500)
        );
        assert_eq!(
            policy.delay_for(1, Some(Duration::from_secs(60))),
            Duration::from_secs(8)
        );
    }

    #[test]
    fn test_should_retry_only_transient_within_budget() {
        let policy = RetryPolicy::default();
        let transient = GenerationError::Timeout;
        let permanent = GenerationError::InvalidInput("bad".into());
        assert!(policy.should_retry(&transient, 0));
        assert!(policy.should_retry(&transient, 1));
        assert!(!policy.should_retry(&transient, 2));
        assert!(!policy.should_retry(&permanent, 0));
    }
}

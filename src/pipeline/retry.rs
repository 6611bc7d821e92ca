//! Exponential backoff for failed flushes.

use std::time::Duration;

/// Bounded exponential backoff: `initial_delay * 2^attempt`, at most
/// `max_retries` consecutive scheduled retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_retries: u32,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.initial_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Delay for the next retry after `retry_count` consecutive failures,
    /// or `None` once retries are exhausted.
    pub fn next_delay(&self, retry_count: u32) -> Option<Duration> {
        (retry_count < self.max_retries).then(|| self.delay_for(retry_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            initial_delay: Duration::from_millis(1000),
            max_retries: 3,
        }
    }

    #[test]
    fn delays_double_per_attempt() {
        let p = policy();
        assert_eq!(p.delay_for(0), Duration::from_millis(1000));
        assert_eq!(p.delay_for(1), Duration::from_millis(2000));
        assert_eq!(p.delay_for(2), Duration::from_millis(4000));
    }

    #[test]
    fn stops_after_max_retries() {
        let p = policy();
        assert!(p.next_delay(2).is_some());
        assert_eq!(p.next_delay(3), None);
        assert_eq!(p.next_delay(10), None);
    }

    #[test]
    fn huge_attempt_does_not_overflow() {
        assert_eq!(
            policy().delay_for(64),
            Duration::from_secs(u64::from(u32::MAX))
        );
    }
}

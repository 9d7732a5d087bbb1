//! Bounded exponential backoff

use std::time::Duration;

/// How often and how patiently a request is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(32),
        }
    }
}

impl RetryPolicy {
    /// Whether another attempt is allowed after `attempt` (1-based) failed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay before the attempt following `attempt` (1-based).
    ///
    /// `base * 2^(attempt-1)`, capped at `max_delay`. A server-provided
    /// `Retry-After` wins when it asks for longer. A hint beyond `max_delay`
    /// yields `None` and the caller gives up.
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Option<Duration> {
        let exponent = attempt.saturating_sub(1).min(31);
        let backoff = self
            .base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay);

        match retry_after {
            Some(hint) if hint > self.max_delay => None,
            Some(hint) if hint > backoff => Some(hint),
            _ => Some(backoff),
        }
    }
}

/// Parse a `Retry-After` header given in seconds.
///
/// The HTTP-date form is not used by Google APIs and yields `None`.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_per_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1, None), Some(Duration::from_millis(500)));
        assert_eq!(policy.delay_for(2, None), Some(Duration::from_secs(1)));
        assert_eq!(policy.delay_for(3, None), Some(Duration::from_secs(2)));
        assert_eq!(policy.delay_for(4, None), Some(Duration::from_secs(4)));
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 50,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        };
        assert_eq!(policy.delay_for(5, None), Some(Duration::from_secs(10)));
        assert_eq!(policy.delay_for(40, None), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_retry_after_wins_when_longer() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.delay_for(1, Some(Duration::from_secs(7))),
            Some(Duration::from_secs(7))
        );
        assert_eq!(
            policy.delay_for(4, Some(Duration::from_secs(1))),
            Some(Duration::from_secs(4))
        );
        assert_eq!(
            policy.delay_for(1, Some(policy.max_delay)),
            Some(policy.max_delay)
        );
    }

    #[test]
    fn test_retry_after_beyond_cap_gives_up() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1, Some(Duration::from_secs(60))), None);
        assert_eq!(policy.delay_for(1, Some(Duration::from_secs(3600))), None);
    }

    #[test]
    fn test_should_retry() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(4));
        assert!(!policy.should_retry(5));
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after("12"), Some(Duration::from_secs(12)));
        assert_eq!(parse_retry_after(" 3 "), Some(Duration::from_secs(3)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }
}

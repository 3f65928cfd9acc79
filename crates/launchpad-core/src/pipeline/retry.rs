//! Retry policy for failed step attempts.
//!
//! A step declares `retry: n` extra attempts. Timeouts count as failed
//! attempts. Once the run is cancelled no further retries are made, except
//! for always-run steps which finish their full budget.

/// Stateless retry policy.
pub struct RetryHandler;

impl RetryHandler {
    /// Total attempts allowed for a step with `retry` extra attempts.
    pub fn max_attempts(retry: u32) -> u32 {
        retry.saturating_add(1)
    }

    /// Whether another attempt should follow the failed `attempt` (1-based).
    pub fn should_retry(retry: u32, attempt: u32, cancelled: bool, always_run: bool) -> bool {
        if cancelled && !always_run {
            return false;
        }
        attempt < Self::max_attempts(retry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_retry_means_single_attempt() {
        assert_eq!(RetryHandler::max_attempts(0), 1);
        assert!(!RetryHandler::should_retry(0, 1, false, false));
    }

    #[test]
    fn retry_two_allows_three_attempts() {
        assert_eq!(RetryHandler::max_attempts(2), 3);
        assert!(RetryHandler::should_retry(2, 1, false, false));
        assert!(RetryHandler::should_retry(2, 2, false, false));
        assert!(!RetryHandler::should_retry(2, 3, false, false));
    }

    #[test]
    fn cancellation_stops_retries_except_always_run() {
        assert!(!RetryHandler::should_retry(3, 1, true, false));
        assert!(RetryHandler::should_retry(3, 1, true, true));
    }

    #[test]
    fn max_attempts_saturates() {
        assert_eq!(RetryHandler::max_attempts(u32::MAX), u32::MAX);
    }
}

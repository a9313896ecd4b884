//! Backoff policy and the clock used between attempts.

use std::time::Duration;

use crate::storage::RemoteErrorKind;

pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Fixed-interval retry policy for store contention.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub interval: Duration,
    /// Total attempts, the first one included. Zero behaves like one.
    pub max_attempts: u32,
    /// Which failure classes are worth another attempt.
    pub retryable: fn(RemoteErrorKind) -> bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_INTERVAL, DEFAULT_MAX_ATTEMPTS)
    }
}

impl BackoffPolicy {
    #[must_use]
    pub const fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
            retryable: RemoteErrorKind::is_contention,
        }
    }

    #[must_use]
    pub const fn with_predicate(mut self, retryable: fn(RemoteErrorKind) -> bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// Whether a failure on attempt number `attempt` (1-based) gets another try.
    #[must_use]
    pub fn should_retry(&self, kind: RemoteErrorKind, attempt: u32) -> bool {
        attempt < self.max_attempts.max(1) && (self.retryable)(kind)
    }
}

/// Waits between attempts. Tests swap in a recording fake.
#[allow(async_fn_in_trait)]
pub trait Sleeper {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_retries_contention_only() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.interval, Duration::from_secs(5));
        assert_eq!(policy.max_attempts, 5);

        assert!(policy.should_retry(RemoteErrorKind::VersionConflict, 1));
        assert!(policy.should_retry(RemoteErrorKind::RateLimited, 4));
        assert!(!policy.should_retry(RemoteErrorKind::RateLimited, 5));
        assert!(!policy.should_retry(RemoteErrorKind::Unauthorized, 1));
        assert!(!policy.should_retry(RemoteErrorKind::Transport, 1));
    }

    #[test]
    fn custom_predicate_widens_retry_set() {
        let policy = BackoffPolicy::new(Duration::ZERO, 3)
            .with_predicate(|kind| kind.is_contention() || kind == RemoteErrorKind::Transport);
        assert!(policy.should_retry(RemoteErrorKind::Transport, 2));
        assert!(!policy.should_retry(RemoteErrorKind::Transport, 3));
    }

    #[test]
    fn zero_attempts_means_a_single_try() {
        let policy = BackoffPolicy::new(Duration::ZERO, 0);
        assert!(!policy.should_retry(RemoteErrorKind::VersionConflict, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_sleeper_waits_on_the_runtime_clock() {
        let start = tokio::time::Instant::now();
        TokioSleeper.sleep(Duration::from_secs(5)).await;
        assert!(start.elapsed() >= Duration::from_secs(5));
    }
}

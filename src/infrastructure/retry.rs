//! Retry policy with exponential backoff for provider calls.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::domain::errors::ProviderError;

/// Capped exponential backoff over transient provider errors.
///
/// Backoff doubles per retry: 500ms → 1s → 2s → ... capped at the
/// configured maximum. Fatal errors are returned immediately without
/// consuming retries.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_backoff_ms: u64,
    max_backoff_ms: u64,
}

impl RetryPolicy {
    /// Create a retry policy. `max_retries` of zero means a single
    /// attempt.
    pub const fn new(max_retries: u32, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_retries,
            initial_backoff_ms,
            max_backoff_ms,
        }
    }

    /// Execute an operation, retrying transient failures with backoff.
    ///
    /// Returns the first success, the first fatal error, or the last
    /// transient error once retries are exhausted.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        debug!(retries = attempt, "operation succeeded after retries");
                    }
                    return Ok(result);
                }
                Err(err) => {
                    if self.should_retry(&err, attempt) {
                        let backoff = self.calculate_backoff(attempt);
                        warn!(
                            attempt = attempt + 1,
                            ?backoff,
                            error = %err,
                            "transient provider error, backing off"
                        );
                        sleep(backoff).await;
                        attempt += 1;
                    } else {
                        if err.is_transient() {
                            warn!(
                                attempts = attempt + 1,
                                error = %err,
                                "retries exhausted"
                            );
                        } else {
                            debug!(error = %err, "fatal provider error, not retrying");
                        }
                        return Err(err);
                    }
                }
            }
        }
    }

    /// min(initial * 2^attempt, max)
    fn calculate_backoff(&self, attempt: u32) -> Duration {
        let backoff_ms = self
            .initial_backoff_ms
            .saturating_mul(2_u64.saturating_pow(attempt))
            .min(self.max_backoff_ms);
        Duration::from_millis(backoff_ms)
    }

    fn should_retry(&self, error: &ProviderError, attempt: u32) -> bool {
        attempt < self.max_retries && error.is_transient()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, 500, 30_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let policy = RetryPolicy::new(5, 500, 8_000);

        assert_eq!(policy.calculate_backoff(0), Duration::from_millis(500));
        assert_eq!(policy.calculate_backoff(1), Duration::from_millis(1_000));
        assert_eq!(policy.calculate_backoff(2), Duration::from_millis(2_000));
        assert_eq!(policy.calculate_backoff(3), Duration::from_millis(4_000));
        assert_eq!(policy.calculate_backoff(4), Duration::from_millis(8_000));
        assert_eq!(policy.calculate_backoff(5), Duration::from_millis(8_000));
    }

    #[test]
    fn retry_decision_honors_kind_and_budget() {
        let policy = RetryPolicy::new(3, 100, 1_000);

        assert!(policy.should_retry(&ProviderError::Transient("503".into()), 0));
        assert!(policy.should_retry(&ProviderError::Transient("timeout".into()), 2));
        assert!(!policy.should_retry(&ProviderError::Transient("503".into()), 3));
        assert!(!policy.should_retry(&ProviderError::Fatal("401".into()), 0));
    }

    #[tokio::test]
    async fn succeeds_without_retrying() {
        let policy = RetryPolicy::new(3, 1, 10);
        let calls = Arc::new(AtomicU32::new(0));

        let result = policy
            .execute(|| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ProviderError>(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let policy = RetryPolicy::new(3, 1, 10);
        let calls = Arc::new(AtomicU32::new(0));

        let result = policy
            .execute(|| {
                let calls = Arc::clone(&calls);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(ProviderError::Transient("overloaded".into()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fatal_errors_short_circuit() {
        let policy = RetryPolicy::new(3, 1, 10);
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<i32, _> = policy
            .execute(|| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(ProviderError::Fatal("invalid api key".into()))
                }
            })
            .await;

        assert!(result.unwrap_err().is_fatal());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhaustion_returns_the_last_transient_error() {
        let policy = RetryPolicy::new(2, 1, 10);
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<i32, _> = policy
            .execute(|| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(ProviderError::Transient("still overloaded".into()))
                }
            })
            .await;

        assert!(result.unwrap_err().is_transient());
        // Initial attempt plus two retries.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn zero_retries_means_single_attempt() {
        let policy = RetryPolicy::new(0, 1, 10);
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<i32, _> = policy
            .execute(|| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(ProviderError::Transient("overloaded".into()))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

//! Bounded retry policy for external collaborator calls.
//!
//! Backoff doubles with each attempt and is capped:
//! `min(initial_backoff * 2^attempt, max_backoff)`.
//! Only transient errors (see [`crate::domain::DomainError::is_transient`]) are retried.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::domain::errors::DomainResult;
use crate::domain::models::RetryConfig;

/// Retry policy with exponential backoff and a fixed attempt budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    max_attempts: u32,
    /// Initial backoff duration in milliseconds
    initial_backoff_ms: u64,
    /// Maximum backoff duration in milliseconds
    max_backoff_ms: u64,
}

impl RetryPolicy {
    /// Create a new retry policy. A zero attempt budget is raised to one.
    pub fn new(max_attempts: u32, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff_ms,
            max_backoff_ms: max_backoff_ms.max(initial_backoff_ms),
        }
    }

    /// A policy that retries immediately, for tests and dry runs.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, 0, 0)
    }

    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Backoff to wait after the failed attempt number `attempt` (0-indexed).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let backoff_ms = self
            .initial_backoff_ms
            .saturating_mul(2_u64.saturating_pow(attempt))
            .min(self.max_backoff_ms);

        Duration::from_millis(backoff_ms)
    }

    /// Whether another attempt is allowed after `attempt` failed.
    pub const fn has_attempts_left(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts
    }

    /// Run `operation` until it succeeds, fails permanently, or the budget runs out.
    pub async fn execute<F, Fut, T>(&self, label: &str, mut operation: F) -> DomainResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DomainResult<T>>,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        debug!(operation = label, retries = attempt, "succeeded after retries");
                    }
                    return Ok(result);
                }
                Err(err) if err.is_transient() && self.has_attempts_left(attempt) => {
                    let backoff = self.backoff(attempt);
                    warn!(
                        operation = label,
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "transient failure, retrying"
                    );
                    sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) => {
                    if err.is_transient() {
                        warn!(
                            operation = label,
                            attempts = attempt + 1,
                            error = %err,
                            "retry budget exhausted"
                        );
                    }
                    return Err(err);
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            config.initial_backoff_ms,
            config.max_backoff_ms,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::DomainError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_backoff_calculation() {
        let policy = RetryPolicy::new(5, 1000, 60000);

        assert_eq!(policy.backoff(0), Duration::from_millis(1000));
        assert_eq!(policy.backoff(1), Duration::from_millis(2000));
        assert_eq!(policy.backoff(2), Duration::from_millis(4000));
        assert_eq!(policy.backoff(6), Duration::from_millis(60000));
    }

    #[test]
    fn test_zero_attempts_raised_to_one() {
        let policy = RetryPolicy::new(0, 10, 5);
        assert_eq!(policy.max_attempts(), 1);
        assert!(!policy.has_attempts_left(0));
    }

    #[tokio::test]
    async fn test_execute_retries_transient_until_success() {
        let policy = RetryPolicy::immediate(3);
        let calls = Arc::new(AtomicU32::new(0));

        let result = policy
            .execute("test", || {
                let calls = Arc::clone(&calls);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(DomainError::ProposalFailed("flaky".into()))
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
    async fn test_execute_gives_up_after_budget() {
        let policy = RetryPolicy::immediate(3);
        let calls = Arc::new(AtomicU32::new(0));

        let result: DomainResult<()> = policy
            .execute("test", || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(DomainError::ScoringFailed("down".into()))
                }
            })
            .await;

        assert!(matches!(result, Err(DomainError::ScoringFailed(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_execute_does_not_retry_permanent_errors() {
        let policy = RetryPolicy::immediate(5);
        let calls = Arc::new(AtomicU32::new(0));

        let result: DomainResult<()> = policy
            .execute("test", || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(DomainError::InvalidState("broken".into()))
                }
            })
            .await;

        assert!(matches!(result, Err(DomainError::InvalidState(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

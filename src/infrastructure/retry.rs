//! Retry policy with exponential backoff for external tracker calls.

use std::future::Future;
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use tracing::{debug, warn};

use crate::domain::errors::TrackerError;
use crate::domain::models::RetryConfig;

/// Bounded retry around a single tracker call.
///
/// - Retry on: rate limits, 5xx, network failures, per-attempt timeouts
/// - Do NOT retry: other 4xx, decode failures
///
/// Each attempt is bounded by `call_timeout`; all attempts together are
/// bounded by `overall_timeout`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, at least 1.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Cap on any single delay.
    pub max_backoff: Duration,
    /// Bound on one attempt.
    pub call_timeout: Duration,
    /// Bound on all attempts together.
    pub overall_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    /// Policy from the `retry` config section.
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            call_timeout: Duration::from_millis(config.call_timeout_ms),
            overall_timeout: Duration::from_millis(config.overall_timeout_ms),
        }
    }

    /// A single attempt, no waiting. Useful in tests.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Execute `operation`, retrying transient failures.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T, TrackerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TrackerError>>,
    {
        self.execute_when(TrackerError::is_transient, operation).await
    }

    /// Execute `operation`, retrying only failures `retryable` accepts.
    pub async fn execute_when<R, F, Fut, T>(&self, retryable: R, mut operation: F) -> Result<T, TrackerError>
    where
        R: Fn(&TrackerError) -> bool,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TrackerError>>,
    {
        let schedule = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_backoff)
            .with_max_interval(self.max_backoff)
            .with_max_elapsed_time(Some(self.overall_timeout))
            .build();

        let max_attempts = self.max_attempts;
        let call_timeout = self.call_timeout;
        let retryable = &retryable;
        let mut attempts = 0u32;

        let retried = backoff::future::retry_notify(
            schedule,
            || {
                attempts += 1;
                let attempt = attempts;
                let call = operation();
                async move {
                    let outcome = match tokio::time::timeout(call_timeout, call).await {
                        Ok(result) => result,
                        Err(_) => Err(TrackerError::Timeout(duration_ms(call_timeout))),
                    };
                    outcome.map_err(|err| {
                        if retryable(&err) && attempt < max_attempts {
                            backoff::Error::transient(err)
                        } else {
                            if attempt > 1 {
                                debug!(attempt, error = %err, "giving up on tracker call");
                            }
                            backoff::Error::permanent(err)
                        }
                    })
                }
            },
            |err: TrackerError, wait: Duration| {
                warn!(error = %err, wait_ms = duration_ms(wait), "transient tracker error, retrying");
            },
        );

        match tokio::time::timeout(self.overall_timeout, retried).await {
            Ok(result) => result,
            Err(_) => Err(TrackerError::Timeout(duration_ms(self.overall_timeout))),
        }
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            call_timeout: Duration::from_millis(200),
            overall_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result = fast_policy(3)
            .execute(|| {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(TrackerError::Http { status: 502, message: "bad gateway".into() })
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
    async fn test_stops_at_attempt_cap() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<(), _> = fast_policy(2)
            .execute(|| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(TrackerError::Network("reset".into()))
                }
            })
            .await;
        assert!(matches!(result, Err(TrackerError::Network(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<(), _> = fast_policy(5)
            .execute(|| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(TrackerError::Http { status: 422, message: "invalid".into() })
                }
            })
            .await;
        assert!(matches!(result, Err(TrackerError::Http { status: 422, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slow_call_times_out() {
        let mut policy = fast_policy(1);
        policy.call_timeout = Duration::from_millis(10);
        let result: Result<(), _> = policy
            .execute(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(TrackerError::Timeout(10))));
    }

    #[tokio::test]
    async fn test_execute_when_narrows_what_is_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<(), _> = fast_policy(5)
            .execute_when(TrackerError::is_rejected_unprocessed, || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(TrackerError::Http { status: 502, message: "bad gateway".into() })
                }
            })
            .await;
        assert!(matches!(result, Err(TrackerError::Http { status: 502, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

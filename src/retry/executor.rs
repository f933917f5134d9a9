//! The retry loop.

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{debug, error, warn};

use super::classify::{RetryMarker, Retryable};
use super::policy::RetryPolicy;

/// Information about a failed attempt that is about to be retried.
///
/// Passed to the hook of [`RetryExecutor::execute_with_hooks`] right before
/// the executor sleeps.
#[derive(Debug, Clone)]
pub struct RetryAttempt<'a, E> {
    /// Label of the operation being retried.
    pub label: &'a str,
    /// The retry about to happen (1-based).
    pub attempt: u32,
    /// Configured retry ceiling.
    pub max_retries: u32,
    /// Delay before the retry.
    pub delay: Duration,
    /// Marker that made the failure retryable.
    pub marker: RetryMarker,
    /// The error from the failed attempt.
    pub error: &'a E,
    /// Time elapsed since the first attempt started.
    pub elapsed: Duration,
}

/// Re-runs an operation while it fails with explicitly retryable errors.
///
/// When retries run out, or an error carries no [`RetryMarker`], the last
/// error is returned unchanged.
///
/// # Examples
///
/// ```rust
/// use floodgate::{RetryExecutor, RetryPolicy, Transient};
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let calls = AtomicU32::new(0);
/// let executor = RetryExecutor::new(
///     RetryPolicy::new()
///         .with_max_retries(3)
///         .with_base_delay(Duration::from_millis(1)),
/// );
///
/// let result = executor
///     .execute("fetch-quote", || {
///         let n = calls.fetch_add(1, Ordering::SeqCst);
///         async move {
///             if n < 2 {
///                 Err(Transient::retryable("busy"))
///             } else {
///                 Ok(42)
///             }
///         }
///     })
///     .await;
///
/// assert_eq!(result.unwrap(), 42);
/// assert_eq!(calls.load(Ordering::SeqCst), 3);
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    /// Create an executor for the given policy.
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Get the policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `operation`, retrying transient failures.
    pub async fn execute<T, E, F, Fut>(&self, label: &str, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + fmt::Display,
    {
        self.execute_with_hooks(label, operation, |_| {}).await
    }

    /// Run `operation`, calling `on_retry` before every backoff sleep.
    ///
    /// The hook is synchronous; use it for metrics or bookkeeping.
    pub async fn execute_with_hooks<T, E, F, Fut, H>(
        &self,
        label: &str,
        mut operation: F,
        mut on_retry: H,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + fmt::Display,
        H: FnMut(&RetryAttempt<'_, E>),
    {
        let start = Instant::now();
        let max_retries = self.policy.max_retries();
        let mut retries = 0u32;

        loop {
            let error = match operation().await {
                Ok(value) => {
                    if retries > 0 {
                        debug!(label, attempts = retries + 1, "operation succeeded after retrying");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            let Some(marker) = error.retry_marker() else {
                error!(label, retries, error = %error, "operation failed with a non-retryable error");
                return Err(error);
            };

            let Some(delay) = self.policy.delay_for_retry(retries + 1) else {
                error!(label, retries, error = %error, "operation failed, retries exhausted");
                return Err(error);
            };

            retries += 1;
            warn!(
                label,
                retry = retries,
                max_retries,
                delay_ms = delay.as_millis() as u64,
                throttling = marker.throttling,
                error = %error,
                "retryable failure, backing off"
            );

            on_retry(&RetryAttempt {
                label,
                attempt: retries,
                max_retries,
                delay,
                marker,
                error: &error,
                elapsed: start.elapsed(),
            });

            tokio::time::sleep(delay).await;
        }
    }
}

/// Run `operation` under `policy`; shorthand for a one-off executor.
///
/// ```rust
/// use floodgate::{with_retry, RetryPolicy, Transient};
///
/// # tokio_test::block_on(async {
/// let result: Result<(), _> = with_retry("delete-object", &RetryPolicy::new(), || async {
///     Err(Transient::fatal("access denied"))
/// })
/// .await;
///
/// assert_eq!(result.unwrap_err().into_inner(), "access denied");
/// # });
/// ```
pub async fn with_retry<T, E, F, Fut>(label: &str, policy: &RetryPolicy, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + fmt::Display,
{
    RetryExecutor::new(policy.clone()).execute(label, operation).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::Transient;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tracing_test::traced_test;

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_retries(max_retries)
            .with_base_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let calls = AtomicU32::new(0);
        let executor = RetryExecutor::new(fast_policy(3));

        let result: Result<i32, Transient<&str>> = executor
            .execute("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(7) }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausts_after_max_retries() {
        let calls = AtomicU32::new(0);
        let executor = RetryExecutor::new(fast_policy(3));

        let result: Result<(), _> = executor
            .execute("op", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(Transient::retryable(format!("failure {}", n + 1))) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4); // 1 initial + 3 retries
        assert_eq!(result.unwrap_err().into_inner(), "failure 4");
    }

    #[tokio::test]
    async fn test_unmarked_error_is_attempted_once() {
        let calls = AtomicU32::new(0);
        let executor = RetryExecutor::new(fast_policy(5));

        let result: Result<(), _> = executor
            .execute("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Transient::fatal("invalid input")) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let executor = RetryExecutor::new(fast_policy(5));

        let result = executor
            .execute("op", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(Transient::throttled("rate limited"))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_stops_at_first_fatal_error() {
        let calls = AtomicU32::new(0);
        let executor = RetryExecutor::new(fast_policy(5));

        let result: Result<(), _> = executor
            .execute("op", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(Transient::retryable("flaky"))
                    } else {
                        Err(Transient::fatal("gone"))
                    }
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(result.unwrap_err().into_inner(), "gone");
    }

    #[tokio::test]
    async fn test_zero_retries_policy() {
        let calls = AtomicU32::new(0);
        let executor = RetryExecutor::new(RetryPolicy::no_retry());

        let result: Result<(), _> = executor
            .execute("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Transient::retryable("flaky")) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_hook_sees_each_retry() {
        let executor = RetryExecutor::new(fast_policy(2));
        let mut seen = Vec::new();

        let _: Result<(), _> = executor
            .execute_with_hooks(
                "hooked",
                || async { Err(Transient::throttled("slow down")) },
                |attempt| {
                    assert_eq!(attempt.label, "hooked");
                    assert_eq!(attempt.max_retries, 2);
                    assert!(attempt.marker.throttling);
                    assert!(attempt.delay <= Duration::from_millis(5));
                    seen.push(attempt.attempt);
                },
            )
            .await;

        assert_eq!(seen, vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleeps_follow_backoff() {
        let executor = RetryExecutor::new(
            RetryPolicy::new()
                .with_max_retries(3)
                .with_base_delay(Duration::from_millis(100))
                .without_jitter(),
        );
        let start = tokio::time::Instant::now();

        let _: Result<(), _> = executor
            .execute("op", || async { Err(Transient::retryable("down")) })
            .await;

        // 100 + 200 + 400
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(700));
        assert!(elapsed < Duration::from_millis(750));
    }

    #[tokio::test]
    async fn test_with_retry_shorthand() {
        let calls = AtomicU32::new(0);

        let result = with_retry("shorthand", &fast_policy(1), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(Transient::retryable("once"))
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_logs_retry_and_give_up() {
        let executor = RetryExecutor::new(fast_policy(1));

        let _: Result<(), _> = executor
            .execute("logged-op", || async { Err(Transient::retryable("unavailable")) })
            .await;

        assert!(logs_contain("retryable failure, backing off"));
        assert!(logs_contain("retries exhausted"));
        assert!(logs_contain("logged-op"));
    }
}

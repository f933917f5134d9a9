//! Retry policy configuration.

use std::time::Duration;

use super::backoff::{self, JitterStrategy};

/// Default ceiling on retries (not counting the initial attempt).
pub const DEFAULT_MAX_RETRIES: u32 = 5;
/// Default delay before the first retry.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(100);
/// Default cap on any single backoff delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(5000);

/// A retry policy describing how failed operations are re-attempted.
///
/// Policies are pure data. The [`RetryExecutor`](super::RetryExecutor) reads
/// them; nothing here sleeps or performs I/O.
///
/// # Examples
///
/// ```rust
/// use floodgate::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new()
///     .with_max_retries(3)
///     .with_base_delay(Duration::from_millis(50))
///     .with_max_delay(Duration::from_secs(1));
///
/// assert_eq!(policy.max_retries(), 3);
/// assert!(policy.delay_for_retry(4).is_none());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter: JitterStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            jitter: JitterStrategy::Equal,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the defaults: 5 retries, 100ms base, 5s cap,
    /// equal jitter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a policy that never retries.
    pub fn no_retry() -> Self {
        Self::default().with_max_retries(0)
    }

    /// Set the maximum number of retries.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the delay before the first retry.
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Set the cap on any single delay.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Set the jitter strategy.
    pub fn with_jitter(mut self, jitter: JitterStrategy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Disable jitter, making delays deterministic.
    pub fn without_jitter(self) -> Self {
        self.with_jitter(JitterStrategy::None)
    }

    /// Get the maximum number of retries.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Get the base delay.
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Get the delay cap.
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Get the jitter strategy.
    pub fn jitter(&self) -> JitterStrategy {
        self.jitter
    }

    /// Delay to wait before retry number `retry` (1-based).
    ///
    /// Returns `None` once `retry` exceeds `max_retries`, and for `0`.
    ///
    /// ```rust
    /// use floodgate::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::new().with_max_retries(2).without_jitter();
    ///
    /// assert_eq!(policy.delay_for_retry(1), Some(Duration::from_millis(100)));
    /// assert_eq!(policy.delay_for_retry(2), Some(Duration::from_millis(200)));
    /// assert_eq!(policy.delay_for_retry(3), None);
    /// ```
    pub fn delay_for_retry(&self, retry: u32) -> Option<Duration> {
        if retry == 0 || retry > self.max_retries {
            return None;
        }

        Some(backoff::delay_with_factor(
            retry,
            self.base_delay,
            self.max_delay,
            self.jitter.factor(),
        ))
    }

    /// Check that the delay bounds are coherent.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.max_delay < self.base_delay {
            Err("RetryPolicy max_delay must not be smaller than base_delay")
        } else {
            Ok(())
        }
    }
}

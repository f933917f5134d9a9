//! The persisted breaker record and its transition rules.
//!
//! A [`CircuitBreakerRecord`] is the whole shared state of one breaker. The
//! guard loads it, applies exactly one of the transitions defined here, and
//! writes it back. State only moves through these methods; there is no
//! public setter for `state`.

use std::fmt;
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Breaker verdict for one downstream system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "SCREAMING_SNAKE_CASE")
)]
pub enum CircuitState {
    /// Calls pass through.
    #[default]
    Closed,
    /// Calls are blocked until the reset timeout elapses.
    Open,
    /// A probe call is allowed through to test recovery.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "CLOSED"),
            Self::Open => write!(f, "OPEN"),
            Self::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Thresholds a breaker is tripped and reset with.
///
/// These seed a new record the first time a system fails. Once a record
/// exists, its own persisted thresholds are authoritative.
///
/// ```rust
/// use floodgate::BreakerSettings;
/// use std::time::Duration;
///
/// let settings = BreakerSettings::new()
///     .with_error_threshold_percentage(50)
///     .with_max_failure_count(4)
///     .with_reset_timeout(Duration::from_secs(1))
///     .with_failure_time_window(Duration::from_secs(10));
///
/// assert!(settings.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerSettings {
    /// Failure rate (percent) at which the breaker trips.
    pub error_threshold_percentage: u8,
    /// Denominator of the failure rate.
    pub max_failure_count: u32,
    /// Minimum time spent OPEN before a probe.
    pub reset_timeout: Duration,
    /// Gap after which the failure count starts over.
    pub failure_time_window: Duration,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            error_threshold_percentage: 50,
            max_failure_count: 10,
            reset_timeout: Duration::from_secs(30),
            failure_time_window: Duration::from_secs(60),
        }
    }
}

impl BreakerSettings {
    /// Create settings with the defaults (50%, 10, 30s, 60s).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the failure-rate threshold in percent.
    pub fn with_error_threshold_percentage(mut self, percentage: u8) -> Self {
        self.error_threshold_percentage = percentage;
        self
    }

    /// Set the failure-rate denominator.
    pub fn with_max_failure_count(mut self, count: u32) -> Self {
        self.max_failure_count = count;
        self
    }

    /// Set the reset timeout.
    pub fn with_reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout;
        self
    }

    /// Set the failure window.
    pub fn with_failure_time_window(mut self, window: Duration) -> Self {
        self.failure_time_window = window;
        self
    }

    /// Check that the thresholds describe a usable breaker.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.error_threshold_percentage > 100 {
            return Err("error_threshold_percentage must be between 0 and 100");
        }
        if self.max_failure_count == 0 {
            return Err("max_failure_count must be greater than zero");
        }
        Ok(())
    }
}

/// One breaker's persisted state, keyed by `system_id`.
///
/// Times are epoch milliseconds and durations are milliseconds, so a record
/// written by one process is meaningful to every other process that shares
/// the store.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "camelCase")
)]
pub struct CircuitBreakerRecord {
    system_id: String,
    #[cfg_attr(feature = "serde", serde(default))]
    state: CircuitState,
    #[cfg_attr(feature = "serde", serde(default))]
    failure_count: u32,
    #[cfg_attr(feature = "serde", serde(default))]
    last_failure_time: u64,
    #[cfg_attr(feature = "serde", serde(default))]
    error_threshold_percentage: u8,
    #[cfg_attr(feature = "serde", serde(default))]
    max_failure_count: u32,
    #[cfg_attr(feature = "serde", serde(default))]
    reset_timeout: u64,
    #[cfg_attr(feature = "serde", serde(default))]
    failure_time_window: u64,
}

impl CircuitBreakerRecord {
    /// A fresh CLOSED record with no failures.
    pub fn new(system_id: impl Into<String>, settings: &BreakerSettings) -> Self {
        Self::from_persisted(system_id, CircuitState::Closed, 0, 0, settings)
    }

    /// Rebuild a record from persisted columns.
    ///
    /// Intended for [`StateStore`](super::StateStore) implementations that
    /// do not store records as serialized documents.
    pub fn from_persisted(
        system_id: impl Into<String>,
        state: CircuitState,
        failure_count: u32,
        last_failure_time: u64,
        settings: &BreakerSettings,
    ) -> Self {
        Self {
            system_id: system_id.into(),
            state,
            failure_count,
            last_failure_time,
            error_threshold_percentage: settings.error_threshold_percentage,
            max_failure_count: settings.max_failure_count,
            reset_timeout: settings.reset_timeout.as_millis() as u64,
            failure_time_window: settings.failure_time_window.as_millis() as u64,
        }
    }

    /// Identifier of the protected system.
    pub fn system_id(&self) -> &str {
        &self.system_id
    }

    /// Current verdict.
    pub fn state(&self) -> CircuitState {
        self.state
    }

    /// Failures in the current window.
    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    /// Epoch milliseconds of the last failure or transition.
    pub fn last_failure_time(&self) -> u64 {
        self.last_failure_time
    }

    /// The thresholds stored with this record.
    pub fn settings(&self) -> BreakerSettings {
        BreakerSettings {
            error_threshold_percentage: self.error_threshold_percentage,
            max_failure_count: self.max_failure_count,
            reset_timeout: Duration::from_millis(self.reset_timeout),
            failure_time_window: Duration::from_millis(self.failure_time_window),
        }
    }

    /// `failure_count / max_failure_count * 100`.
    ///
    /// Infinite when `max_failure_count` is zero and failures were recorded.
    pub fn failure_rate(&self) -> f64 {
        self.failure_count as f64 / self.max_failure_count as f64 * 100.0
    }

    /// Whether the failure rate has reached the threshold.
    pub fn exceeds_threshold(&self) -> bool {
        u64::from(self.failure_count) * 100
            >= u64::from(self.error_threshold_percentage) * u64::from(self.max_failure_count)
    }

    /// Epoch milliseconds at which an OPEN breaker may be probed.
    pub fn reset_deadline(&self) -> u64 {
        self.last_failure_time.saturating_add(self.reset_timeout)
    }

    /// Whether the reset timeout has elapsed at `now`.
    pub fn is_reset_elapsed(&self, now: u64) -> bool {
        now >= self.reset_deadline()
    }

    /// Count a call blocked while OPEN. Pushes the reset deadline forward.
    pub(crate) fn register_blocked_call(&mut self, now: u64) {
        self.failure_count = self.failure_count.saturating_add(1);
        self.last_failure_time = now;
    }

    /// OPEN → HALF_OPEN once the reset timeout has elapsed.
    pub(crate) fn begin_probe(&mut self) {
        self.state = CircuitState::HalfOpen;
    }

    /// A successful probe closes the breaker.
    pub(crate) fn close(&mut self, now: u64) {
        self.state = CircuitState::Closed;
        self.failure_count = 0;
        self.last_failure_time = now;
    }

    /// Account for a failed or timed-out call.
    ///
    /// Returns `true` if this failure moved the breaker to OPEN. A failed
    /// probe always reopens the breaker.
    pub(crate) fn register_failure(&mut self, now: u64) -> bool {
        let since_last = now.saturating_sub(self.last_failure_time);
        self.failure_count = if since_last > self.failure_time_window {
            1
        } else {
            self.failure_count.saturating_add(1)
        };
        self.last_failure_time = now;

        let previous = self.state;
        if previous == CircuitState::HalfOpen || self.exceeds_threshold() {
            self.state = CircuitState::Open;
        }
        previous != CircuitState::Open && self.state == CircuitState::Open
    }
}

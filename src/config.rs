//! Per-system configuration loaded from JSON.
//!
//! A [`SystemConfig`] carries everything a call site needs to guard one
//! downstream system: the breaker thresholds, the call timeout and, optionally,
//! the retry settings for the calls made inside the guard. Durations are
//! integer milliseconds and keys are camelCase, matching the persisted record.
//!
//! ```rust
//! use floodgate::config::SystemConfig;
//! use std::time::Duration;
//!
//! let config = SystemConfig::from_json_str(
//!     r#"{
//!         "systemId": "payments",
//!         "timeoutMs": 2000,
//!         "errorThresholdPercentage": 50,
//!         "maxFailureCount": 4,
//!         "resetTimeout": 1000,
//!         "failureTimeWindow": 10000,
//!         "retry": { "maxRetries": 3 }
//!     }"#,
//! )
//! .unwrap();
//!
//! let policy = config.guard_policy::<String>();
//! assert_eq!(policy.timeout(), Duration::from_secs(2));
//! assert_eq!(config.retry_policy().max_retries(), 3);
//! ```

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::breaker::{BreakerSettings, GuardPolicy};
use crate::retry::{RetryPolicy, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY, DEFAULT_MAX_RETRIES};

/// Error loading a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The document is not valid JSON for this shape.
    Parse(String),
    /// The document parsed but describes an unusable setup.
    Invalid {
        /// System the entry belongs to.
        system_id: String,
        /// What is wrong with it.
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(msg) => write!(f, "invalid configuration document: {}", msg),
            Self::Invalid { system_id, reason } => {
                write!(f, "invalid configuration for {}: {}", system_id, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e.to_string())
    }
}

/// Retry settings for calls made to one system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrySettings {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Upper bound on any delay, in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_ms: DEFAULT_BASE_DELAY.as_millis() as u64,
            max_delay_ms: DEFAULT_MAX_DELAY.as_millis() as u64,
        }
    }
}

impl RetrySettings {
    /// The equivalent [`RetryPolicy`], with the default jitter.
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_retries(self.max_retries)
            .with_base_delay(Duration::from_millis(self.base_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
    }
}

fn default_timeout_ms() -> u64 {
    crate::breaker::DEFAULT_TIMEOUT.as_millis() as u64
}

/// Configuration of one protected system.
///
/// Missing breaker fields take the [`BreakerSettings`] defaults; a missing
/// `timeoutMs` takes the guard's default timeout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemConfig {
    /// Identifier of the protected system.
    pub system_id: String,
    /// Per-call deadline in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Failure rate (percent) at which the breaker trips.
    #[serde(default = "defaults::error_threshold_percentage")]
    pub error_threshold_percentage: u8,
    /// Denominator of the failure rate.
    #[serde(default = "defaults::max_failure_count")]
    pub max_failure_count: u32,
    /// Minimum time spent OPEN, in milliseconds.
    #[serde(default = "defaults::reset_timeout")]
    pub reset_timeout: u64,
    /// Gap after which failures stop accumulating, in milliseconds.
    #[serde(default = "defaults::failure_time_window")]
    pub failure_time_window: u64,
    /// Retry settings for calls inside the guard.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetrySettings>,
}

mod defaults {
    use crate::breaker::BreakerSettings;

    pub(super) fn error_threshold_percentage() -> u8 {
        BreakerSettings::default().error_threshold_percentage
    }

    pub(super) fn max_failure_count() -> u32 {
        BreakerSettings::default().max_failure_count
    }

    pub(super) fn reset_timeout() -> u64 {
        BreakerSettings::default().reset_timeout.as_millis() as u64
    }

    pub(super) fn failure_time_window() -> u64 {
        BreakerSettings::default().failure_time_window.as_millis() as u64
    }
}

impl SystemConfig {
    /// Default configuration for `system_id`.
    pub fn new(system_id: impl Into<String>) -> Self {
        let settings = BreakerSettings::default();
        Self {
            system_id: system_id.into(),
            timeout_ms: default_timeout_ms(),
            error_threshold_percentage: settings.error_threshold_percentage,
            max_failure_count: settings.max_failure_count,
            reset_timeout: settings.reset_timeout.as_millis() as u64,
            failure_time_window: settings.failure_time_window.as_millis() as u64,
            retry: None,
        }
    }

    /// Parse and validate one configuration object.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate an array of configuration objects.
    ///
    /// System ids must be unique within the array.
    pub fn list_from_json_str(json: &str) -> Result<Vec<Self>, ConfigError> {
        let configs: Vec<Self> = serde_json::from_str(json)?;
        for (i, config) in configs.iter().enumerate() {
            config.validate()?;
            if configs[..i].iter().any(|c| c.system_id == config.system_id) {
                return Err(ConfigError::Invalid {
                    system_id: config.system_id.clone(),
                    reason: "duplicate systemId".to_string(),
                });
            }
        }
        Ok(configs)
    }

    /// Check the entry describes a usable breaker and retry setup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::Invalid {
            system_id: self.system_id.clone(),
            reason: reason.to_string(),
        };

        if self.system_id.trim().is_empty() {
            return Err(invalid("systemId must not be empty"));
        }
        if self.timeout_ms == 0 {
            return Err(invalid("timeoutMs must be greater than zero"));
        }
        self.settings().validate().map_err(invalid)?;
        if let Some(retry) = &self.retry {
            retry.to_policy().validate().map_err(invalid)?;
        }
        Ok(())
    }

    /// The breaker thresholds.
    pub fn settings(&self) -> BreakerSettings {
        BreakerSettings::new()
            .with_error_threshold_percentage(self.error_threshold_percentage)
            .with_max_failure_count(self.max_failure_count)
            .with_reset_timeout(Duration::from_millis(self.reset_timeout))
            .with_failure_time_window(Duration::from_millis(self.failure_time_window))
    }

    /// A guard policy without fallback. Add one with
    /// [`GuardPolicy::with_fallback`].
    pub fn guard_policy<T>(&self) -> GuardPolicy<T> {
        GuardPolicy::new(self.system_id.clone())
            .with_timeout(Duration::from_millis(self.timeout_ms))
            .with_settings(self.settings())
    }

    /// The retry policy, or the defaults when no `retry` block is present.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
            .as_ref()
            .map(RetrySettings::to_policy)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_document_uses_defaults() {
        let config = SystemConfig::from_json_str(r#"{"systemId":"orders"}"#).unwrap();

        assert_eq!(config, SystemConfig::new("orders"));
        assert_eq!(config.settings(), BreakerSettings::default());
        assert_eq!(config.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn test_partial_retry_block() {
        let config = SystemConfig::from_json_str(
            r#"{"systemId":"orders","retry":{"maxRetries":2,"maxDelayMs":800}}"#,
        )
        .unwrap();

        let policy = config.retry_policy();
        assert_eq!(policy.max_retries(), 2);
        assert_eq!(policy.base_delay(), DEFAULT_BASE_DELAY);
        assert_eq!(policy.max_delay(), Duration::from_millis(800));
    }

    #[test]
    fn test_guard_policy_conversion() {
        let config = SystemConfig {
            timeout_ms: 250,
            max_failure_count: 4,
            ..SystemConfig::new("search")
        };

        let policy = config.guard_policy::<()>();
        assert_eq!(policy.system_id(), "search");
        assert_eq!(policy.timeout(), Duration::from_millis(250));
        assert_eq!(policy.settings().max_failure_count, 4);
        assert!(!policy.has_fallback());
    }

    #[test]
    fn test_rejects_bad_threshold() {
        let err = SystemConfig::from_json_str(
            r#"{"systemId":"x","errorThresholdPercentage":150}"#,
        )
        .unwrap_err();

        assert!(matches!(err, ConfigError::Invalid { .. }));
        assert!(err.to_string().contains("between 0 and 100"));
    }

    #[test]
    fn test_rejects_zero_failure_count_and_timeout() {
        assert!(SystemConfig::from_json_str(r#"{"systemId":"x","maxFailureCount":0}"#).is_err());
        assert!(SystemConfig::from_json_str(r#"{"systemId":"x","timeoutMs":0}"#).is_err());
        assert!(SystemConfig::from_json_str(r#"{"systemId":"  "}"#).is_err());
    }

    #[test]
    fn test_rejects_inverted_retry_delays() {
        let err = SystemConfig::from_json_str(
            r#"{"systemId":"x","retry":{"baseDelayMs":1000,"maxDelayMs":10}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_parse_error() {
        let err = SystemConfig::from_json_str("{").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_list_rejects_duplicates() {
        let ok = SystemConfig::list_from_json_str(r#"[{"systemId":"a"},{"systemId":"b"}]"#)
            .unwrap();
        assert_eq!(ok.len(), 2);

        let err = SystemConfig::list_from_json_str(r#"[{"systemId":"a"},{"systemId":"a"}]"#)
            .unwrap_err();
        assert!(err.to_string().contains("duplicate systemId"));
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(SystemConfig::new("x")).unwrap();
        assert_eq!(json["systemId"], "x");
        assert_eq!(json["timeoutMs"], 10_000);
        assert_eq!(json["failureTimeWindow"], 60_000);
        assert!(json.get("retry").is_none());
    }
}

//! Error types for guarded calls and state stores.

use std::fmt;
use std::time::Duration;

use crate::retry::{RetryMarker, Retryable};

/// Message carried by [`BreakerError::Open`].
pub const OPEN_MESSAGE: &str = "circuit breaker is open, request blocked to prevent overload";

/// Error returned by a guarded call.
///
/// The operation's own error passes through untouched inside
/// [`BreakerError::Operation`]; the other two variants are produced by the
/// breaker itself.
///
/// # Examples
///
/// ```rust
/// use floodgate::BreakerError;
///
/// let err: BreakerError<String> = BreakerError::open("inventory");
/// assert!(err.is_open());
/// assert_eq!(err.system_id(), Some("inventory"));
///
/// let err = BreakerError::Operation("404".to_string());
/// assert_eq!(err.into_operation_error(), Some("404".to_string()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakerError<E> {
    /// The breaker is OPEN and the reset timeout has not elapsed.
    Open {
        /// The blocked system.
        system_id: String,
        /// Human-readable explanation.
        message: String,
    },
    /// The operation did not settle before the call's deadline.
    Timeout {
        /// The system whose call timed out.
        system_id: String,
        /// The deadline that was exceeded.
        timeout: Duration,
    },
    /// The operation itself failed.
    Operation(E),
}

impl<E> BreakerError<E> {
    /// Create an open-circuit error.
    pub fn open(system_id: impl Into<String>) -> Self {
        Self::Open {
            system_id: system_id.into(),
            message: OPEN_MESSAGE.to_string(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(system_id: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            system_id: system_id.into(),
            timeout,
        }
    }

    /// Returns true if the call was blocked by an open breaker.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }

    /// Returns true if the call timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns true if the operation produced the error.
    pub fn is_operation(&self) -> bool {
        matches!(self, Self::Operation(_))
    }

    /// The system id, for breaker-produced errors.
    pub fn system_id(&self) -> Option<&str> {
        match self {
            Self::Open { system_id, .. } | Self::Timeout { system_id, .. } => Some(system_id),
            Self::Operation(_) => None,
        }
    }

    /// Extract the operation's error if present.
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            Self::Operation(e) => Some(e),
            _ => None,
        }
    }
}

impl<E: fmt::Display> fmt::Display for BreakerError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open { system_id, message } => write!(f, "{} ({})", message, system_id),
            Self::Timeout { system_id, timeout } => write!(
                f,
                "circuit breaker timeout exceeded after {:?} ({})",
                timeout, system_id
            ),
            Self::Operation(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for BreakerError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Operation(e) => Some(e),
            _ => None,
        }
    }
}

/// Failure reading or writing a breaker record.
///
/// The guard never surfaces these to callers; they are logged and dropped.
#[derive(Debug)]
pub enum StoreError {
    /// Filesystem or socket failure.
    Io(std::io::Error),
    /// The record could not be encoded or decoded.
    Serialization(String),
    /// Failure reported by a storage backend.
    Backend {
        /// Backend message.
        message: String,
        /// Set when the backend flagged the failure as transient.
        marker: Option<RetryMarker>,
    },
}

impl StoreError {
    /// A non-retryable backend failure.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            marker: None,
        }
    }

    /// A backend failure flagged as transient.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            marker: Some(RetryMarker::transient()),
        }
    }

    /// A backend failure flagged as throttling.
    pub fn throttled(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            marker: Some(RetryMarker::throttling()),
        }
    }
}

impl Retryable for StoreError {
    fn retry_marker(&self) -> Option<RetryMarker> {
        match self {
            Self::Backend { marker, .. } => *marker,
            Self::Io(_) | Self::Serialization(_) => None,
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "state store I/O error: {}", e),
            Self::Serialization(msg) => write!(f, "state store serialization error: {}", msg),
            Self::Backend { message, .. } => write!(f, "state store backend error: {}", message),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

#[cfg(feature = "serde")]
impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

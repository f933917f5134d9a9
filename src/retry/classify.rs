//! Explicit retryability markers.
//!
//! The executor only retries errors that say so. A downstream client marks a
//! fault as transient by returning a [`RetryMarker`] from
//! [`Retryable::retry_marker`]; anything else is fatal on the first failure.

use std::fmt;
use std::sync::Arc;

/// Marker attached by a downstream collaborator to a transient fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RetryMarker {
    /// The fault is a rate-limit rejection rather than a generic transient.
    pub throttling: bool,
}

impl RetryMarker {
    /// A plain transient fault.
    pub fn transient() -> Self {
        Self { throttling: false }
    }

    /// A throttling fault.
    pub fn throttling() -> Self {
        Self { throttling: true }
    }
}

/// Errors that can carry a retryability marker.
///
/// # Examples
///
/// ```rust
/// use floodgate::{RetryMarker, Retryable};
///
/// #[derive(Debug)]
/// enum ApiError {
///     Unavailable,
///     NotFound,
/// }
///
/// impl Retryable for ApiError {
///     fn retry_marker(&self) -> Option<RetryMarker> {
///         match self {
///             ApiError::Unavailable => Some(RetryMarker::transient()),
///             ApiError::NotFound => None,
///         }
///     }
/// }
///
/// assert!(ApiError::Unavailable.is_retryable());
/// assert!(!ApiError::NotFound.is_retryable());
/// ```
pub trait Retryable {
    /// The marker, if the collaborator flagged this fault as transient.
    fn retry_marker(&self) -> Option<RetryMarker>;

    /// Returns true if a marker is present.
    fn is_retryable(&self) -> bool {
        self.retry_marker().is_some()
    }
}

impl<T: Retryable + ?Sized> Retryable for &T {
    fn retry_marker(&self) -> Option<RetryMarker> {
        (**self).retry_marker()
    }
}

impl<T: Retryable + ?Sized> Retryable for Box<T> {
    fn retry_marker(&self) -> Option<RetryMarker> {
        (**self).retry_marker()
    }
}

impl<T: Retryable + ?Sized> Retryable for Arc<T> {
    fn retry_marker(&self) -> Option<RetryMarker> {
        (**self).retry_marker()
    }
}

/// An error paired with an explicit retry decision.
///
/// Useful when the underlying error type is foreign and cannot implement
/// [`Retryable`] itself.
///
/// ```rust
/// use floodgate::{Retryable, Transient};
///
/// let err = Transient::throttled("slow down");
/// assert!(err.is_retryable());
/// assert!(err.retry_marker().unwrap().throttling);
///
/// let fatal = Transient::fatal("bad request");
/// assert!(!fatal.is_retryable());
/// assert_eq!(fatal.into_inner(), "bad request");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transient<E> {
    error: E,
    marker: Option<RetryMarker>,
}

impl<E> Transient<E> {
    /// Mark `error` as a plain transient fault.
    pub fn retryable(error: E) -> Self {
        Self {
            error,
            marker: Some(RetryMarker::transient()),
        }
    }

    /// Mark `error` as a throttling fault.
    pub fn throttled(error: E) -> Self {
        Self {
            error,
            marker: Some(RetryMarker::throttling()),
        }
    }

    /// Wrap `error` without a marker.
    pub fn fatal(error: E) -> Self {
        Self {
            error,
            marker: None,
        }
    }

    /// Get a reference to the wrapped error.
    pub fn error(&self) -> &E {
        &self.error
    }

    /// Extract the wrapped error.
    pub fn into_inner(self) -> E {
        self.error
    }
}

impl<E> Retryable for Transient<E> {
    fn retry_marker(&self) -> Option<RetryMarker> {
        self.marker
    }
}

impl<E: fmt::Display> fmt::Display for Transient<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl<E: std::error::Error + 'static> std::error::Error for Transient<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

//! Fallback values for blocked or failed calls.

use std::fmt;
use std::sync::Arc;

/// Type alias for a fallback supplier.
pub type FallbackFn<T> = Arc<dyn Fn() -> T + Send + Sync>;

/// What a guarded call returns instead of an error.
///
/// Either a literal value, cloned on each use, or a supplier invoked on each
/// use.
///
/// ```rust
/// use floodgate::Fallback;
///
/// let literal = Fallback::value("degraded");
/// assert_eq!(literal.resolve(), "degraded");
///
/// let computed = Fallback::supplier(|| vec![0u8; 2]);
/// assert_eq!(computed.resolve(), vec![0, 0]);
/// ```
pub enum Fallback<T> {
    /// A literal value.
    Value(T),
    /// A zero-argument supplier.
    Supplier(FallbackFn<T>),
}

impl<T> Fallback<T> {
    /// A literal fallback value.
    pub fn value(value: T) -> Self {
        Self::Value(value)
    }

    /// A fallback computed on demand.
    pub fn supplier<F>(f: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::Supplier(Arc::new(f))
    }

    /// Produce the fallback result.
    pub fn resolve(&self) -> T
    where
        T: Clone,
    {
        match self {
            Self::Value(value) => value.clone(),
            Self::Supplier(f) => f(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Fallback<T> {
    /// Convert into a supplier, cloning a literal value on each call.
    pub fn into_fn(self) -> FallbackFn<T> {
        match self {
            Self::Value(value) => Arc::new(move || value.clone()),
            Self::Supplier(f) => f,
        }
    }
}

impl<T: Clone> Clone for Fallback<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Value(value) => Self::Value(value.clone()),
            Self::Supplier(f) => Self::Supplier(Arc::clone(f)),
        }
    }
}

impl<T> fmt::Debug for Fallback<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(_) => write!(f, "Fallback::Value"),
            Self::Supplier(_) => write!(f, "Fallback::Supplier"),
        }
    }
}

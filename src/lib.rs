//! # Floodgate
//!
//! > *"Shut the gate before the flood, not after"*
//!
//! A Rust library for guarding calls to unreliable downstream systems.
//!
//! ## Philosophy
//!
//! **Floodgate** composes two small primitives:
//! - **Breaker** = a circuit breaker whose state lives in a shared store, so
//!   every process calling the same system shares one verdict
//! - **Retry** = exponential backoff with jitter for failures the downstream
//!   explicitly marked as transient
//!
//! Both are explicit wrappers around a zero-argument async operation. They can
//! be used alone or nested, retry inside the breaker, so that only the final
//! outcome of a retried call is counted.
//!
//! ## Quick Example
//!
//! ```rust
//! use floodgate::{
//!     BreakerError, CircuitBreaker, GuardPolicy, MemoryStore, RetryExecutor, RetryPolicy,
//!     Transient,
//! };
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let breaker = CircuitBreaker::new(MemoryStore::new());
//! let retry = RetryExecutor::new(RetryPolicy::new().with_base_delay(Duration::from_millis(1)));
//! let policy = GuardPolicy::new("exchange-rates").with_timeout(Duration::from_secs(1));
//!
//! let rate: Result<f64, BreakerError<Transient<String>>> = breaker
//!     .call(&policy, || {
//!         retry.execute("fetch-rate", || async { Ok::<_, Transient<String>>(1.08) })
//!     })
//!     .await;
//!
//! assert_eq!(rate.unwrap(), 1.08);
//! # });
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod breaker;
pub mod clock;
#[cfg(feature = "serde")]
pub mod config;
pub mod retry;
pub mod testing;

// Re-exports
pub use breaker::{
    BreakerError, BreakerSettings, CircuitBreaker, CircuitBreakerRecord, CircuitState, Fallback,
    GuardPolicy, GuardedOperation, MemoryStore, RetryingStore, StateStore, StoreError,
};
#[cfg(feature = "serde")]
pub use breaker::JsonFileStore;
pub use clock::{Clock, SystemClock};
#[cfg(feature = "serde")]
pub use config::{ConfigError, SystemConfig};
pub use retry::{with_retry, RetryAttempt, RetryExecutor, RetryMarker, RetryPolicy, Retryable, Transient};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::breaker::{
        BreakerError, BreakerSettings, CircuitBreaker, CircuitState, Fallback, GuardPolicy,
        StateStore,
    };
    pub use crate::retry::{with_retry, RetryExecutor, RetryPolicy, Retryable, Transient};
}

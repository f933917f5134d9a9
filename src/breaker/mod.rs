//! Circuit breaking with externally persisted state.
//!
//! A breaker tracks the health of one named downstream system. Its state
//! lives in a [`StateStore`], not in memory, so every process sharing the
//! store shares one verdict:
//!
//! - **CLOSED**: calls pass through; failures are counted inside a sliding
//!   failure window
//! - **OPEN**: calls are blocked (or answered by the fallback) until the reset
//!   timeout has elapsed since the last recorded failure
//! - **HALF_OPEN**: one probe call is let through; success closes the breaker,
//!   failure reopens it
//!
//! # Quick Start
//!
//! ```rust
//! use floodgate::{BreakerSettings, CircuitBreaker, GuardPolicy, MemoryStore};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let breaker = CircuitBreaker::new(MemoryStore::new());
//! let policy = GuardPolicy::new("inventory")
//!     .with_timeout(Duration::from_millis(500))
//!     .with_settings(BreakerSettings::new().with_max_failure_count(4))
//!     .with_fallback_value("unknown".to_string());
//!
//! let stock = breaker
//!     .call(&policy, || async { Err::<String, _>("connection refused") })
//!     .await;
//!
//! assert_eq!(stock.unwrap(), "unknown");
//! # });
//! ```
//!
//! # Store faults
//!
//! The guard never fails because of its store. A failed load is treated as
//! "no known state" and the call proceeds; a failed save is logged and the
//! call's own outcome is returned.

mod error;
mod fallback;
mod guard;
mod record;
mod store;

pub use error::{BreakerError, StoreError, OPEN_MESSAGE};
pub use fallback::{Fallback, FallbackFn};
pub use guard::{CircuitBreaker, GuardPolicy, GuardedOperation, DEFAULT_TIMEOUT};
pub use record::{BreakerSettings, CircuitBreakerRecord, CircuitState};
#[cfg(feature = "serde")]
pub use store::JsonFileStore;
pub use store::{MemoryStore, RetryingStore, StateStore};

//! Retrying transient faults with exponential backoff.
//!
//! The retry side of floodgate is split the same way as the breaker side:
//!
//! - **Pure core**: [`backoff`] computes delays and [`RetryPolicy`] is plain
//!   data, both trivially testable
//! - **Explicit classification**: only errors implementing [`Retryable`] and
//!   returning a [`RetryMarker`] are retried; nothing is inferred from
//!   messages or error types
//! - **Imperative shell**: [`RetryExecutor`] runs the loop, logs each retry
//!   and sleeps
//!
//! # Quick Start
//!
//! ```rust
//! use floodgate::{RetryExecutor, RetryPolicy, Transient};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let executor = RetryExecutor::new(
//!     RetryPolicy::new()
//!         .with_max_retries(3)
//!         .with_base_delay(Duration::from_millis(10)),
//! );
//!
//! let value = executor
//!     .execute("read-parameter", || async { Ok::<_, Transient<String>>(7) })
//!     .await
//!     .unwrap();
//!
//! assert_eq!(value, 7);
//! # });
//! ```
//!
//! # Exhaustion
//!
//! There is no wrapper error for an exhausted loop: the caller receives the
//! error from the final attempt exactly as the operation produced it.

pub mod backoff;
mod classify;
mod executor;
mod policy;

pub use backoff::JitterStrategy;
pub use classify::{RetryMarker, Retryable, Transient};
pub use executor::{with_retry, RetryAttempt, RetryExecutor};
pub use policy::{RetryPolicy, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY, DEFAULT_MAX_RETRIES};

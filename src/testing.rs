//! Testing utilities for code that uses floodgate.
//!
//! This module provides a controllable clock, a store that fails on demand,
//! and assertion macros for guarded-call results.
//!
//! # Examples
//!
//! ## ManualClock
//!
//! ```rust
//! use floodgate::testing::ManualClock;
//! use floodgate::Clock;
//! use std::time::Duration;
//!
//! let clock = ManualClock::new(1_000);
//! let shared = clock.clone();
//!
//! shared.advance(Duration::from_millis(250));
//! assert_eq!(clock.now_millis(), 1_250);
//! ```
//!
//! ## Assertion Macros
//!
//! ```rust
//! use floodgate::{assert_circuit_open, assert_operation_error, BreakerError};
//!
//! let blocked: Result<(), BreakerError<&str>> = Err(BreakerError::open("search"));
//! assert_circuit_open!(blocked);
//!
//! let failed: Result<(), BreakerError<&str>> = Err(BreakerError::Operation("500"));
//! assert_operation_error!(failed, "500");
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::breaker::{CircuitBreakerRecord, StateStore, StoreError};
use crate::clock::Clock;

/// A clock that only moves when told to.
///
/// Clones share the same time, so a test can keep one handle and give the
/// other to a [`CircuitBreaker`](crate::CircuitBreaker).
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock reading `start_millis`.
    pub fn new(start_millis: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_millis)),
        }
    }

    /// Jump to `millis`.
    pub fn set(&self, millis: u64) {
        self.now.store(millis, Ordering::SeqCst);
    }

    /// Move forward by `by`.
    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// A [`StateStore`] wrapper that injects failures.
///
/// Faults are either queued (`fail_next_*`, consumed one per call) or
/// permanent (`break_*`). Every call is counted, failed or not.
///
/// ```rust
/// use floodgate::testing::FaultyStore;
/// use floodgate::{MemoryStore, StateStore, StoreError};
///
/// # tokio_test::block_on(async {
/// let store = FaultyStore::new(MemoryStore::new());
/// store.fail_next_loads(1, || StoreError::transient("busy"));
///
/// assert!(store.load("a").await.is_err());
/// assert!(store.load("a").await.is_ok());
/// assert_eq!(store.load_calls(), 2);
/// # });
/// ```
#[derive(Debug, Default)]
pub struct FaultyStore<S> {
    inner: S,
    load_faults: Mutex<VecDeque<StoreError>>,
    save_faults: Mutex<VecDeque<StoreError>>,
    loads_broken: AtomicBool,
    saves_broken: AtomicBool,
    yield_after_load: AtomicBool,
    load_calls: AtomicU32,
    save_calls: AtomicU32,
}

impl<S> FaultyStore<S> {
    /// Wrap `inner`, initially passing every call through.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            load_faults: Mutex::new(VecDeque::new()),
            save_faults: Mutex::new(VecDeque::new()),
            loads_broken: AtomicBool::new(false),
            saves_broken: AtomicBool::new(false),
            yield_after_load: AtomicBool::new(false),
            load_calls: AtomicU32::new(0),
            save_calls: AtomicU32::new(0),
        }
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Fail the next `n` loads with errors built by `make`.
    pub fn fail_next_loads(&self, n: usize, make: impl Fn() -> StoreError) {
        self.load_faults.lock().extend((0..n).map(|_| make()));
    }

    /// Fail the next `n` saves with errors built by `make`.
    pub fn fail_next_saves(&self, n: usize, make: impl Fn() -> StoreError) {
        self.save_faults.lock().extend((0..n).map(|_| make()));
    }

    /// Make every load fail until switched back.
    pub fn break_loads(&self, broken: bool) {
        self.loads_broken.store(broken, Ordering::SeqCst);
    }

    /// Make every save fail until switched back.
    pub fn break_saves(&self, broken: bool) {
        self.saves_broken.store(broken, Ordering::SeqCst);
    }

    /// Yield to the scheduler after every successful read.
    ///
    /// Concurrent calls on one task then all read before any of them writes,
    /// which makes lost updates between them reproducible.
    pub fn yield_after_loads(&self, enabled: bool) {
        self.yield_after_load.store(enabled, Ordering::SeqCst);
    }

    /// Loads attempted so far.
    pub fn load_calls(&self) -> u32 {
        self.load_calls.load(Ordering::SeqCst)
    }

    /// Saves attempted so far.
    pub fn save_calls(&self) -> u32 {
        self.save_calls.load(Ordering::SeqCst)
    }

    fn next_fault(&self, queue: &Mutex<VecDeque<StoreError>>, broken: &AtomicBool) -> Option<StoreError> {
        if let Some(fault) = queue.lock().pop_front() {
            return Some(fault);
        }
        broken
            .load(Ordering::SeqCst)
            .then(|| StoreError::backend("store unavailable"))
    }
}

impl<S: StateStore> StateStore for FaultyStore<S> {
    async fn load(&self, system_id: &str) -> Result<Option<CircuitBreakerRecord>, StoreError> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(fault) = self.next_fault(&self.load_faults, &self.loads_broken) {
            return Err(fault);
        }
        let record = self.inner.load(system_id).await?;
        if self.yield_after_load.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
        Ok(record)
    }

    async fn save(&self, record: &CircuitBreakerRecord) -> Result<(), StoreError> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(fault) = self.next_fault(&self.save_faults, &self.saves_broken) {
            return Err(fault);
        }
        self.inner.save(record).await
    }
}

/// Assert that a guarded call was blocked by an open breaker.
///
/// # Example
///
/// ```rust
/// use floodgate::{assert_circuit_open, BreakerError};
///
/// let result: Result<i32, BreakerError<String>> = Err(BreakerError::open("ledger"));
/// assert_circuit_open!(result);
/// ```
#[macro_export]
macro_rules! assert_circuit_open {
    ($result:expr) => {
        match $result {
            Err($crate::BreakerError::Open { .. }) => {}
            Err(e) => panic!("Expected an open circuit, got error: {:?}", e),
            Ok(v) => panic!("Expected an open circuit, got Ok: {:?}", v),
        }
    };
}

/// Assert that a guarded call failed with the operation's own error.
///
/// # Example
///
/// ```rust
/// use floodgate::{assert_operation_error, BreakerError};
///
/// let result: Result<i32, BreakerError<&str>> = Err(BreakerError::Operation("404"));
/// assert_operation_error!(result, "404");
/// ```
#[macro_export]
macro_rules! assert_operation_error {
    ($result:expr, $expected:expr) => {
        match $result {
            Err($crate::BreakerError::Operation(e)) => assert_eq!(e, $expected),
            Err(e) => panic!("Expected operation error {:?}, got: {:?}", $expected, e),
            Ok(v) => panic!("Expected operation error {:?}, got Ok: {:?}", $expected, v),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::{BreakerSettings, MemoryStore};
    use crate::BreakerError;

    #[test]
    fn test_manual_clock_set_and_advance() {
        let clock = ManualClock::new(10);
        clock.advance(Duration::from_secs(1));
        assert_eq!(clock.now_millis(), 1_010);

        clock.set(5);
        assert_eq!(clock.now_millis(), 5);
    }

    #[tokio::test]
    async fn test_faulty_store_queued_then_pass_through() {
        let store = FaultyStore::new(MemoryStore::new());
        let record = CircuitBreakerRecord::new("x", &BreakerSettings::default());
        store.fail_next_saves(2, || StoreError::backend("nope"));

        assert!(store.save(&record).await.is_err());
        assert!(store.save(&record).await.is_err());
        assert!(store.save(&record).await.is_ok());

        assert_eq!(store.save_calls(), 3);
        assert_eq!(store.inner().len(), 1);
    }

    #[tokio::test]
    async fn test_faulty_store_broken_until_repaired() {
        let store = FaultyStore::new(MemoryStore::new());
        store.break_loads(true);
        assert!(store.load("x").await.is_err());
        assert!(store.load("x").await.is_err());

        store.break_loads(false);
        assert!(store.load("x").await.unwrap().is_none());
    }

    #[test]
    #[should_panic(expected = "Expected an open circuit")]
    fn test_assert_circuit_open_panics_on_ok() {
        let result: Result<i32, BreakerError<String>> = Ok(1);
        assert_circuit_open!(result);
    }

    #[test]
    #[should_panic(expected = "Expected operation error")]
    fn test_assert_operation_error_panics_on_timeout() {
        let result: Result<i32, BreakerError<&str>> =
            Err(BreakerError::timeout("x", Duration::from_millis(1)));
        assert_operation_error!(result, "boom");
    }
}

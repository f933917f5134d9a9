//! Retry executor used inside the breaker guard, and on its own.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use floodgate::prelude::*;
use floodgate::testing::{FaultyStore, ManualClock};
use floodgate::{MemoryStore, RetryingStore, StoreError};

fn quick_retries(max_retries: u32) -> RetryPolicy {
    RetryPolicy::new()
        .with_max_retries(max_retries)
        .with_base_delay(Duration::from_millis(1))
        .with_max_delay(Duration::from_millis(4))
}

fn breaker() -> CircuitBreaker<MemoryStore, ManualClock> {
    CircuitBreaker::with_clock(MemoryStore::new(), ManualClock::new(1_700_000_000_000))
}

fn policy() -> GuardPolicy<u32> {
    GuardPolicy::new("quotes").with_settings(
        BreakerSettings::new()
            .with_error_threshold_percentage(50)
            .with_max_failure_count(4),
    )
}

#[tokio::test]
async fn always_retryable_failure_makes_exactly_four_attempts() {
    let attempts = AtomicU32::new(0);

    let result: Result<u32, _> = with_retry("quote", &quick_retries(3), || {
        let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
        async move { Err(Transient::retryable(format!("attempt {} failed", n))) }
    })
    .await;

    assert_eq!(attempts.load(Ordering::SeqCst), 4);
    assert_eq!(result.unwrap_err().into_inner(), "attempt 4 failed");
}

#[tokio::test]
async fn recovered_retries_count_as_one_success() {
    let breaker = breaker();
    let executor = RetryExecutor::new(quick_retries(5));
    let attempts = AtomicU32::new(0);

    let result: Result<u32, BreakerError<Transient<String>>> = breaker
        .call(&policy(), || {
            executor.execute("quote", || {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 3 {
                        Err(Transient::throttled("slow down".to_string()))
                    } else {
                        Ok(42)
                    }
                }
            })
        })
        .await;

    assert_eq!(result.unwrap(), 42);
    assert_eq!(attempts.load(Ordering::SeqCst), 4);
    assert!(breaker.snapshot("quotes").await.is_none());
}

#[tokio::test]
async fn exhausted_retries_count_as_one_failure() {
    let breaker = breaker();
    let executor = RetryExecutor::new(quick_retries(2));
    let attempts = AtomicU32::new(0);

    let result: Result<u32, BreakerError<Transient<String>>> = breaker
        .call(&policy(), || {
            executor.execute("quote", || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(Transient::retryable("unavailable".to_string())) }
            })
        })
        .await;

    let err = result.unwrap_err().into_operation_error().unwrap();
    assert_eq!(err.error(), "unavailable");
    assert_eq!(attempts.load(Ordering::SeqCst), 3);

    let record = breaker.snapshot("quotes").await.unwrap();
    assert_eq!(record.failure_count(), 1);
    assert_eq!(record.state(), CircuitState::Closed);
}

#[tokio::test]
async fn fatal_errors_skip_retries_inside_the_guard() {
    let breaker = breaker();
    let executor = RetryExecutor::new(quick_retries(5));
    let attempts = AtomicU32::new(0);

    let result: Result<u32, BreakerError<Transient<&str>>> = breaker
        .call(&policy(), || {
            executor.execute("quote", || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(Transient::fatal("bad request")) }
            })
        })
        .await;

    assert!(result.unwrap_err().is_operation());
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn retrying_store_hides_transient_store_faults_from_the_guard() {
    let faulty = FaultyStore::new(MemoryStore::new());
    faulty.fail_next_saves(2, || StoreError::throttled("write capacity exceeded"));
    let store = RetryingStore::new(faulty, quick_retries(3));
    let breaker = CircuitBreaker::with_clock(store, ManualClock::new(1_000));

    let _ = breaker
        .call(&policy(), || async { Err::<u32, _>("down") })
        .await;

    let faulty = breaker.store().inner();
    assert_eq!(faulty.save_calls(), 3);
    assert_eq!(faulty.inner().get("quotes").unwrap().failure_count(), 1);
}

#[tokio::test]
async fn retry_hooks_observe_each_backoff() {
    let executor = RetryExecutor::new(quick_retries(3));
    let mut delays = Vec::new();

    let _: Result<(), _> = executor
        .execute_with_hooks(
            "hooked",
            || async { Err(Transient::retryable("busy")) },
            |attempt| delays.push((attempt.attempt, attempt.delay)),
        )
        .await;

    assert_eq!(delays.len(), 3);
    for (i, (attempt, delay)) in delays.iter().enumerate() {
        assert_eq!(*attempt, i as u32 + 1);
        assert!(*delay <= Duration::from_millis(4));
    }
}

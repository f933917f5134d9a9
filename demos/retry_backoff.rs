//! Retry Backoff Example
//!
//! Demonstrates the retry executor:
//! - the delay curve produced by the backoff calculator
//! - retrying only errors explicitly marked as transient
//! - observing retries through a hook
//! - wrapping a state store so its transient faults are retried
//!
//! Run with `cargo run --example retry_backoff`.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use floodgate::retry::backoff;
use floodgate::testing::FaultyStore;
use floodgate::{
    MemoryStore, RetryExecutor, RetryPolicy, RetryingStore, StateStore, StoreError, Transient,
};

fn example_delay_curve() {
    println!("\n=== Example 1: Delay Curve ===");

    let base = Duration::from_millis(100);
    let cap = Duration::from_millis(5000);
    for attempt in 1..=8 {
        println!(
            "  attempt {}: raw {:?}, jittered {:?}",
            attempt,
            backoff::exponential(attempt, base).min(cap),
            backoff::delay(attempt, base, cap)
        );
    }
}

async fn example_marked_errors() {
    println!("\n=== Example 2: Only Marked Errors Retry ===");

    let executor = RetryExecutor::new(
        RetryPolicy::new()
            .with_max_retries(4)
            .with_base_delay(Duration::from_millis(20)),
    );

    let attempts = AtomicU32::new(0);
    let result = executor
        .execute("read-parameter", || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Transient::throttled(format!("rate exceeded ({})", n + 1)))
                } else {
                    Ok("parameter value")
                }
            }
        })
        .await;
    println!("  transient: {:?} after {} attempts", result, attempts.load(Ordering::SeqCst));

    let attempts = AtomicU32::new(0);
    let result: Result<(), _> = executor
        .execute("read-parameter", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(Transient::fatal("parameter not found")) }
        })
        .await;
    println!("  fatal: {:?} after {} attempt", result, attempts.load(Ordering::SeqCst));
}

async fn example_hooks() {
    println!("\n=== Example 3: Retry Hooks ===");

    let executor = RetryExecutor::new(
        RetryPolicy::new()
            .with_max_retries(3)
            .with_base_delay(Duration::from_millis(10)),
    );

    let _: Result<(), _> = executor
        .execute_with_hooks(
            "invoke-function",
            || async { Err(Transient::retryable("service unavailable")) },
            |attempt| {
                println!(
                    "  retry {}/{} in {:?} (elapsed {:?}): {}",
                    attempt.attempt,
                    attempt.max_retries,
                    attempt.delay,
                    attempt.elapsed,
                    attempt.error
                );
            },
        )
        .await;
}

async fn example_retrying_store() -> Result<(), StoreError> {
    println!("\n=== Example 4: Retrying Store ===");

    let faulty = FaultyStore::new(MemoryStore::new());
    faulty.fail_next_loads(2, || StoreError::throttled("read capacity exceeded"));
    let store = RetryingStore::new(
        faulty,
        RetryPolicy::new().with_base_delay(Duration::from_millis(10)),
    );

    let record = store.load("billing").await?;
    println!(
        "  loaded {:?} after {} store calls",
        record,
        store.inner().load_calls()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), StoreError> {
    tracing_subscriber::fmt().init();

    example_delay_curve();
    example_marked_errors().await;
    example_hooks().await;
    example_retrying_store().await
}

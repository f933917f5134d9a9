//! Guarded Call Example
//!
//! Walks one breaker through its whole life cycle:
//! - failures trip it OPEN
//! - blocked calls are answered by a fallback
//! - after the reset timeout a probe closes it again
//!
//! State is kept in a JSON file store under a temporary directory, so the
//! records can be inspected while the example runs.
//!
//! Run with `cargo run --example guarded_call`.

use std::time::Duration;

use floodgate::prelude::*;
use floodgate::{JsonFileStore, SystemConfig};

#[derive(Debug)]
struct UpstreamError(u16);

impl std::fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "upstream responded {}", self.0)
    }
}

impl std::error::Error for UpstreamError {}

const CONFIG: &str = r#"{
    "systemId": "pricing-api",
    "timeoutMs": 200,
    "errorThresholdPercentage": 50,
    "maxFailureCount": 4,
    "resetTimeout": 300,
    "failureTimeWindow": 10000
}"#;

async fn fetch_price(healthy: bool) -> Result<f64, UpstreamError> {
    tokio::time::sleep(Duration::from_millis(20)).await;
    if healthy {
        Ok(12.50)
    } else {
        Err(UpstreamError(503))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let dir = tempfile::tempdir()?;
    let breaker = CircuitBreaker::new(JsonFileStore::new(dir.path()));
    let config = SystemConfig::from_json_str(CONFIG)?;
    let policy = config.guard_policy::<f64>();

    println!("\n=== Failing upstream ===");
    for _ in 0..2 {
        match breaker.call(&policy, || fetch_price(false)).await {
            Ok(price) => println!("  price: {}", price),
            Err(e) => println!("  error: {}", e),
        }
    }

    println!("\n=== Breaker open, fallback configured ===");
    let with_fallback = policy.clone().with_fallback_value(0.0);
    let price = breaker.call(&with_fallback, || fetch_price(true)).await?;
    println!("  fallback price: {}", price);

    if let Some(record) = breaker.snapshot(config.system_id.as_str()).await {
        println!(
            "  state={} failures={} rate={:.0}% probe at {}",
            record.state(),
            record.failure_count(),
            record.failure_rate(),
            record.reset_deadline()
        );
    }

    println!("\n=== After reset timeout ===");
    tokio::time::sleep(Duration::from_millis(350)).await;
    let price = breaker.call(&policy, || fetch_price(true)).await?;
    println!("  live price: {}", price);

    if let Some(record) = breaker.snapshot(config.system_id.as_str()).await {
        println!("  state={} failures={}", record.state(), record.failure_count());
    }

    Ok(())
}

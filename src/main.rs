//! Cold Storage demo
//!
//! Walks through the life of one memoized call: a miss that computes, a hit
//! served from the store, and a second miss once the entry has expired.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cold_storage::{
    spawn_sweep_task, CacheKey, ColdStorage, Config, FnCallback, FreezeOptions, Freezer,
};

/// The expensive operation being memoized.
fn compute_area(width: u64, height: u64) -> anyhow::Result<u64> {
    std::thread::sleep(Duration::from_millis(200));
    width
        .checked_mul(height)
        .context("area does not fit in 64 bits")
}

/// Main entry point for the Cold Storage demo.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the store, the expiry sweeper and the freezer
/// 4. Resolve `computeArea(5, 10)` three times: miss, hit, miss after expiry
/// 5. Print the store statistics as JSON
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cold_storage=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    config.validate()?;
    info!(
        max_entries = ?config.max_entries,
        sweep_interval = ?config.sweep_interval,
        single_flight = config.single_flight,
        "Configuration loaded"
    );

    let storage: ColdStorage<u64> = ColdStorage::from_config(&config);
    let sweeper = config
        .sweep_interval
        .map(|interval| spawn_sweep_task(storage.clone(), interval));
    let freezer = Freezer::from_config(storage.clone(), &config);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let callback = FnCallback(move |outcome: cold_storage::Result<u64>, operation: &str| {
        let _ = tx.send((operation.to_string(), outcome));
    });
    let callback = Arc::new(callback);

    let key = CacheKey::new("computeArea").arg(&5u64).arg(&10u64).namespaced();
    let options = FreezeOptions::new(key.operation()).with_ttl_millis(1000);

    for (round, pause) in [("first call", 0), ("second call", 0), ("after expiry", 1100)] {
        tokio::time::sleep(Duration::from_millis(pause)).await;

        let started = std::time::Instant::now();
        freezer
            .freeze(
                key.clone(),
                options.clone(),
                || compute_area(5, 10),
                Arc::clone(&callback),
            )
            .await?;

        let (operation, outcome) = rx.recv().await.context("callback channel closed")?;
        let value = outcome?;
        info!(
            round,
            operation = %operation,
            value,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Resolved"
        );
    }

    let stats = storage.stats();
    info!(hit_rate = stats.hit_rate(), "Cache statistics");
    println!("{}", serde_json::to_string_pretty(&stats)?);

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    info!("Demo complete");
    Ok(())
}

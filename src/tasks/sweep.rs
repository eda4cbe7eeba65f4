//! Expiry Sweep Task
//!
//! Background task that periodically removes expired cache entries that were
//! never read again.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::ColdStorage;

/// Shortest pause between two sweeps; smaller intervals are raised to it.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Spawns a background task that periodically purges expired entries.
///
/// Each pass takes the store lock like any other operation, so it never
/// interleaves with a `get` or `put` halfway through. An `interval` below
/// [`MIN_SWEEP_INTERVAL`] (including zero) sweeps every
/// [`MIN_SWEEP_INTERVAL`].
///
/// # Returns
/// A JoinHandle for the spawned task; abort it to stop sweeping.
///
/// # Example
/// ```ignore
/// let storage = ColdStorage::<u64>::unbounded();
/// let sweeper = spawn_sweep_task(storage.clone(), Duration::from_secs(1));
/// // Later, during shutdown:
/// sweeper.abort();
/// ```
pub fn spawn_sweep_task<V>(storage: ColdStorage<V>, interval: Duration) -> JoinHandle<()>
where
    V: Send + 'static,
{
    let interval = interval.max(MIN_SWEEP_INTERVAL);

    tokio::spawn(async move {
        info!(interval_ms = interval.as_millis() as u64, "Starting expiry sweep task");

        loop {
            tokio::time::sleep(interval).await;

            let removed = storage.purge_expired();
            if removed > 0 {
                info!(removed, "Expiry sweep removed entries");
            } else {
                debug!("Expiry sweep found nothing to remove");
            }
        }
    })
}

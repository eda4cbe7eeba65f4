//! Cold Storage - A process-local memoization cache
//!
//! Keyed value storage with TTL expiration and LRU eviction, plus cache-aware
//! call wrappers that compute missing values off the calling task.

pub mod cache;
pub mod config;
pub mod error;
pub mod memo;
pub mod tasks;

pub use cache::{CacheStats, CacheStore, ColdStorage};
pub use config::Config;
pub use error::{ColdStorageError, Result};
pub use memo::{CacheKey, FnCallback, FreezeOptions, Freezer, OperationCallback};
pub use tasks::spawn_sweep_task;

//! Cache Module
//!
//! Provides in-memory caching with TTL expiration and LRU eviction.

mod clock;
mod cold_storage;
mod entry;
mod lru;
mod stats;
mod store;


// Re-export public types
pub use clock::{monotonic_ms, Clock, ManualClock, SystemClock};
pub use cold_storage::ColdStorage;
pub use entry::CacheEntry;
pub use lru::LruTracker;
pub use stats::CacheStats;
pub use store::CacheStore;

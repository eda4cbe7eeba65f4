//! Cache Store Module
//!
//! Single-threaded cache engine combining HashMap storage with LRU tracking
//! and TTL expiration. [`ColdStorage`](crate::cache::ColdStorage) wraps it
//! for shared use.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::cache::{CacheEntry, CacheStats, Clock, LruTracker, SystemClock};

// == Cache Store ==
/// Keyed value storage with optional per-entry expiry and an optional
/// capacity bound enforced by least-recently-used eviction.
///
/// Both `get` hits and `put` refresh a key's recency. When a `put` leaves
/// the store above its bound, every expired entry is purged first and only
/// then are live entries evicted, oldest use first.
#[derive(Debug)]
pub struct CacheStore<V> {
    /// Key-value storage
    entries: HashMap<String, CacheEntry<V>>,
    /// LRU access tracker, holds exactly the keys of `entries`
    lru: LruTracker,
    /// Performance statistics
    stats: CacheStats,
    /// Maximum number of entries allowed, None = unbounded
    max_entries: Option<NonZeroUsize>,
    /// Time source for stamping and expiring entries
    clock: Arc<dyn Clock>,
}

impl<V> CacheStore<V> {
    // == Constructors ==
    /// Creates a store with an optional capacity bound and the system clock.
    pub fn new(max_entries: Option<NonZeroUsize>) -> Self {
        Self::with_clock(max_entries, Arc::new(SystemClock))
    }

    /// Creates a store with no capacity bound.
    pub fn unbounded() -> Self {
        Self::new(None)
    }

    /// Creates a store holding at most `max_entries` entries.
    pub fn bounded(max_entries: NonZeroUsize) -> Self {
        Self::new(Some(max_entries))
    }

    /// Creates a store reading time from `clock`.
    pub fn with_clock(max_entries: Option<NonZeroUsize>, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            stats: CacheStats::new(),
            max_entries,
            clock,
        }
    }

    // == Put ==
    /// Stores `value` under `key`, replacing any previous entry.
    ///
    /// With a `ttl` the entry expires `ttl` after now; without one it only
    /// leaves the store through `remove`, `clear` or capacity eviction.
    pub fn put(&mut self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        let key = key.into();
        let now = self.clock.now_ms();

        self.lru.touch(&key);
        self.entries.insert(key, CacheEntry::new(value, now, ttl));
        self.stats.record_insert();

        self.enforce_capacity(now);
        self.stats.set_total_entries(self.entries.len());
    }

    // == Remove ==
    /// Deletes the entry for `key`. Returns whether one was present.
    pub fn remove(&mut self, key: &str) -> bool {
        if self.entries.remove(key).is_none() {
            return false;
        }

        self.lru.remove(key);
        self.stats.record_removals(1);
        self.stats.set_total_entries(self.entries.len());
        true
    }

    // == Clear ==
    /// Removes every entry.
    pub fn clear(&mut self) {
        let count = self.entries.len();
        self.entries.clear();
        self.lru.clear();

        self.stats.record_removals(count);
        self.stats.set_total_entries(0);
        debug!(count, "Cleared cold storage");
    }

    // == Purge Expired ==
    /// Removes all expired entries from the cache.
    ///
    /// Returns the number of entries removed.
    pub fn purge_expired(&mut self) -> usize {
        let removed = self.purge_expired_at(self.clock.now_ms());
        self.stats.set_total_entries(self.entries.len());
        removed
    }

    /// Returns true if `key` holds a live entry. Does not touch recency.
    pub fn contains_key(&self, key: &str) -> bool {
        let now = self.clock.now_ms();
        self.entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired_at(now))
    }

    /// Returns a copy of the entry for `key`, expired or not, without
    /// touching recency or statistics.
    pub fn peek_entry(&self, key: &str) -> Option<CacheEntry<V>>
    where
        V: Clone,
    {
        self.entries.get(key).cloned()
    }

    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    /// The configured capacity bound.
    pub fn capacity(&self) -> Option<NonZeroUsize> {
        self.max_entries
    }

    /// Number of stored entries, including expired ones not yet reclaimed.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // == Internal Helpers ==
    fn purge_expired_at(&mut self, now: u64) -> usize {
        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired_keys {
            self.entries.remove(key);
            self.lru.remove(key);
        }

        let count = expired_keys.len();
        self.stats.record_expirations(count);
        if count > 0 {
            debug!(count, "Purged expired entries");
        }
        count
    }

    fn enforce_capacity(&mut self, now: u64) {
        let Some(max_entries) = self.max_entries else {
            return;
        };
        if self.entries.len() <= max_entries.get() {
            return;
        }

        self.purge_expired_at(now);

        while self.entries.len() > max_entries.get() {
            let Some(oldest) = self.lru.evict_oldest() else {
                break;
            };
            self.entries.remove(&oldest);
            self.stats.record_eviction();
            debug!(key = %oldest, "Evicted least recently used entry");
        }
    }
}

impl<V: Clone> CacheStore<V> {
    // == Get ==
    /// Returns a copy of the live value stored under `key`.
    ///
    /// An expired entry is removed on the spot and reported as absent.
    pub fn get(&mut self, key: &str) -> Option<V> {
        let now = self.clock.now_ms();

        let expired = match self.entries.get(key) {
            None => {
                self.stats.record_miss();
                return None;
            }
            Some(entry) => entry.is_expired_at(now),
        };

        if expired {
            self.entries.remove(key);
            self.lru.remove(key);
            self.stats.record_expirations(1);
            self.stats.record_miss();
            self.stats.set_total_entries(self.entries.len());
            debug!(key, "Dropped expired entry on read");
            return None;
        }

        self.stats.record_hit();
        self.lru.touch(key);

        let entry = self.entries.get(key)?;
        debug!(
            key,
            age_ms = entry.age_ms(now),
            ttl_remaining_ms = ?entry.ttl_remaining_ms(now),
            "Read live entry"
        );
        Some(entry.value.clone())
    }
}

impl<V> Default for CacheStore<V> {
    fn default() -> Self {
        Self::unbounded()
    }
}

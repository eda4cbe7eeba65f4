//! Cold Storage Handle
//!
//! Thread-safe, cloneable front for a [`CacheStore`].

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::cache::{CacheEntry, CacheStats, CacheStore, Clock};
use crate::config::Config;

// == Cold Storage ==
/// Shared handle to one cache store.
///
/// Clones point at the same entries. Every call holds a store-wide lock
/// for its own duration only, so no caller ever sees a partially written
/// entry. Stored values are cloned on read.
#[derive(Debug)]
pub struct ColdStorage<V> {
    inner: Arc<Mutex<CacheStore<V>>>,
}

impl<V> Clone for ColdStorage<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> ColdStorage<V> {
    /// Wraps an existing store.
    pub fn new(store: CacheStore<V>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// Creates a storage with no capacity bound.
    pub fn unbounded() -> Self {
        Self::new(CacheStore::unbounded())
    }

    /// Creates a storage holding at most `max_entries` entries.
    pub fn bounded(max_entries: NonZeroUsize) -> Self {
        Self::new(CacheStore::bounded(max_entries))
    }

    /// Creates a storage reading time from `clock`.
    pub fn with_clock(max_entries: Option<NonZeroUsize>, clock: Arc<dyn Clock>) -> Self {
        Self::new(CacheStore::with_clock(max_entries, clock))
    }

    /// Creates a storage sized by the configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(CacheStore::new(config.max_entries))
    }

    pub fn put(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        self.inner.lock().put(key, value, ttl);
    }

    pub fn remove(&self, key: &str) -> bool {
        self.inner.lock().remove(key)
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Reclaims expired entries, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.inner.lock().purge_expired()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.lock().contains_key(key)
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats()
    }

    pub fn capacity(&self) -> Option<NonZeroUsize> {
        self.inner.lock().capacity()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl<V: Clone> ColdStorage<V> {
    /// Returns the live value for `key`, purging it if it has expired.
    pub fn get(&self, key: &str) -> Option<V> {
        self.inner.lock().get(key)
    }

    pub fn peek_entry(&self, key: &str) -> Option<CacheEntry<V>> {
        self.inner.lock().peek_entry(key)
    }
}

impl<V> Default for ColdStorage<V> {
    fn default() -> Self {
        Self::unbounded()
    }
}

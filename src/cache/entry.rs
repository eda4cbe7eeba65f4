//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::Duration;

use crate::cache::clock::duration_to_ms_ceil;

// == Cache Entry ==
/// A stored value together with its insertion and expiry stamps.
///
/// Timestamps are milliseconds read from the owning store's clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Insertion time
    pub created_at: u64,
    /// Expiration time, None = no expiration
    pub expires_at: Option<u64>,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates an entry stamped at `now_ms`, expiring `ttl` later if given.
    ///
    /// A TTL with a sub-millisecond fraction is rounded up to the next
    /// millisecond.
    pub fn new(value: V, now_ms: u64, ttl: Option<Duration>) -> Self {
        let expires_at = ttl.map(|ttl| now_ms.saturating_add(duration_to_ms_ceil(ttl)));

        Self {
            value,
            created_at: now_ms,
            expires_at,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now_ms`.
    ///
    /// An entry is expired once `now_ms >= expires_at`, so a zero TTL
    /// produces an entry that is already expired.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        match self.expires_at {
            Some(expires) => now_ms >= expires,
            None => false,
        }
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, or None if no expiration is set.
    ///
    /// Expired entries report `Some(0)`.
    pub fn ttl_remaining_ms(&self, now_ms: u64) -> Option<u64> {
        self.expires_at.map(|expires| expires.saturating_sub(now_ms))
    }

    /// Milliseconds since the entry was stored.
    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.created_at)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_creation_no_ttl() {
        let entry = CacheEntry::new("test_value", 1_000, None);

        assert_eq!(entry.value, "test_value");
        assert_eq!(entry.created_at, 1_000);
        assert!(entry.expires_at.is_none());
        assert!(!entry.is_expired_at(u64::MAX));
    }

    #[test]
    fn test_entry_creation_with_ttl() {
        let entry = CacheEntry::new(7u32, 1_000, Some(Duration::from_millis(500)));

        assert_eq!(entry.expires_at, Some(1_500));
        assert!(!entry.is_expired_at(1_499));
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let entry = CacheEntry::new((), 1_000, Some(Duration::from_millis(500)));

        assert!(entry.is_expired_at(1_500), "Entry should be expired at boundary");
        assert!(entry.is_expired_at(2_000));
    }

    #[test]
    fn test_zero_ttl_is_expired_immediately() {
        let entry = CacheEntry::new((), 1_000, Some(Duration::ZERO));
        assert!(entry.is_expired_at(1_000));
    }

    #[test]
    fn test_fractional_ttl_rounds_up() {
        let entry = CacheEntry::new((), 1_000, Some(Duration::from_micros(900)));
        assert_eq!(entry.expires_at, Some(1_001));
        assert!(!entry.is_expired_at(1_000));

        let entry = CacheEntry::new((), 1_000, Some(Duration::from_micros(1_900)));
        assert_eq!(entry.expires_at, Some(1_002));
        assert!(!entry.is_expired_at(1_001));
    }

    #[test]
    fn test_ttl_remaining() {
        let entry = CacheEntry::new((), 1_000, Some(Duration::from_secs(10)));

        assert_eq!(entry.ttl_remaining_ms(1_000), Some(10_000));
        assert_eq!(entry.ttl_remaining_ms(4_000), Some(7_000));
        assert_eq!(entry.ttl_remaining_ms(20_000), Some(0));
    }

    #[test]
    fn test_ttl_remaining_no_expiration() {
        let entry = CacheEntry::new((), 1_000, None);
        assert!(entry.ttl_remaining_ms(5_000).is_none());
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let entry = CacheEntry::new((), 1_000, Some(Duration::MAX));
        assert_eq!(entry.expires_at, Some(u64::MAX));
        assert!(!entry.is_expired_at(u64::MAX - 1));
    }

    #[test]
    fn test_age() {
        let entry = CacheEntry::new((), 1_000, None);
        assert_eq!(entry.age_ms(1_250), 250);
        assert_eq!(entry.age_ms(500), 0);
    }
}

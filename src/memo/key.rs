//! Cache Key Derivation
//!
//! Turns an operation name and its arguments into a deterministic string key.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Separator between argument hashes.
const ARG_SEPARATOR: &str = ":";

/// Hashes a value with a fixed-key hasher.
///
/// The result is identical for equal inputs for the whole life of the
/// process, which is as long as any cached entry can live.
pub fn stable_hash<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

// == Cache Key ==
/// Builder for the key under which one call's result is cached.
///
/// Only the arguments passed to [`CacheKey::arg`] take part in the key, so
/// a caller can leave out arguments that do not affect the result. With no
/// arguments the key is the operation name itself.
///
/// By default the operation name is not part of a key built from
/// arguments: two operations called with equal arguments share a key.
/// Use [`CacheKey::namespaced`] or a separate store per operation when
/// that matters.
///
/// ```
/// use cold_storage::memo::CacheKey;
///
/// let key = CacheKey::new("computeArea").arg(&5).arg(&10).namespaced();
/// assert!(key.to_string().starts_with("computeArea("));
/// assert_eq!(CacheKey::new("loadConfig").to_string(), "loadConfig");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    operation: String,
    arg_hashes: Vec<u64>,
    namespaced: bool,
}

impl CacheKey {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            arg_hashes: Vec::new(),
            namespaced: false,
        }
    }

    /// Adds one argument to the key.
    pub fn arg<T: Hash + ?Sized>(mut self, value: &T) -> Self {
        self.arg_hashes.push(stable_hash(value));
        self
    }

    /// Prefixes the argument hashes with the operation name.
    pub fn namespaced(mut self) -> Self {
        self.namespaced = true;
        self
    }

    /// The operation name the key was built for.
    pub fn operation(&self) -> &str {
        &self.operation
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.arg_hashes.is_empty() {
            return f.write_str(&self.operation);
        }

        let hashes = self
            .arg_hashes
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(ARG_SEPARATOR);

        if self.namespaced {
            write!(f, "{}({})", self.operation, hashes)
        } else {
            f.write_str(&hashes)
        }
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.to_string()
    }
}

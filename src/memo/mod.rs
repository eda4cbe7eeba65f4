//! Memo Module
//!
//! Cache-aware call wrappers built on top of [`ColdStorage`](crate::cache::ColdStorage).
//!
//! A call site derives a [`CacheKey`] from its operation and arguments, then
//! asks a [`Freezer`] to resolve it: a hit returns the stored value, a miss
//! runs the computation off the calling task and stores its result with the
//! TTL from [`FreezeOptions`]. Outcomes are either awaited or delivered to an
//! [`OperationCallback`].

mod callback;
mod freezer;
mod key;

pub use callback::{FnCallback, OperationCallback};
pub use freezer::{FreezeOptions, Freezer};
pub use key::{stable_hash, CacheKey};

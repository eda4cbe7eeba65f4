//! Completion Callbacks
//!
//! How a frozen operation hands its outcome back to the caller.

use std::sync::Arc;

use crate::error::{ColdStorageError, Result};

// == Operation Callback ==
/// Receives the outcome of a cache-aware call.
///
/// Exactly one of the two methods is invoked per call, from a runtime
/// worker thread, together with the operation label from
/// [`FreezeOptions`](crate::memo::FreezeOptions).
pub trait OperationCallback<V>: Send + Sync + 'static {
    /// Called with the cached or freshly computed value.
    fn on_success(&self, value: V, operation: &str);

    /// Called when computing a missing value failed.
    fn on_failure(&self, error: ColdStorageError, operation: &str);
}

// == Closure Adapter ==
/// Adapts one closure receiving the full `Result` to [`OperationCallback`].
///
/// ```
/// use cold_storage::memo::FnCallback;
///
/// let callback = FnCallback(|outcome: cold_storage::Result<u64>, operation: &str| {
///     println!("{operation}: {outcome:?}");
/// });
/// # let _ = callback;
/// ```
pub struct FnCallback<F>(pub F);

impl<V, F> OperationCallback<V> for FnCallback<F>
where
    F: Fn(Result<V>, &str) + Send + Sync + 'static,
{
    fn on_success(&self, value: V, operation: &str) {
        (self.0)(Ok(value), operation)
    }

    fn on_failure(&self, error: ColdStorageError, operation: &str) {
        (self.0)(Err(error), operation)
    }
}

/// One callback shared by many calls.
impl<V, C> OperationCallback<V> for Arc<C>
where
    C: OperationCallback<V> + ?Sized,
{
    fn on_success(&self, value: V, operation: &str) {
        (**self).on_success(value, operation)
    }

    fn on_failure(&self, error: ColdStorageError, operation: &str) {
        (**self).on_failure(error, operation)
    }
}

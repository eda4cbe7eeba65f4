//! Freezer
//!
//! Cache-aware call wrapper: look the key up, and on a miss compute the value
//! off the caller's task, store it with the operation's TTL, and hand it back.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::ColdStorage;
use crate::config::Config;
use crate::error::{ColdStorageError, Result};
use crate::memo::OperationCallback;

// == Freeze Options ==
/// Per-operation settings of a cache-aware call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreezeOptions {
    /// Label passed to callbacks and attached to errors
    pub operation: String,
    /// Lifetime of a computed value, None = never expires
    pub time_to_live: Option<Duration>,
}

impl FreezeOptions {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            time_to_live: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.time_to_live = Some(ttl);
        self
    }

    /// Sets the TTL in milliseconds; any negative value means no expiry.
    pub fn with_ttl_millis(mut self, ttl_ms: i64) -> Self {
        self.time_to_live = u64::try_from(ttl_ms).ok().map(Duration::from_millis);
        self
    }
}

type Waiters<V> = Vec<oneshot::Sender<Result<V>>>;

// == Freezer ==
/// Runs expensive operations at most as often as their cache entries expire.
///
/// In single-flight mode the first caller to miss on a key computes it and
/// every concurrent caller missing on the same key waits for that result.
/// Without it, concurrent misses each compute and the last write wins.
/// Failed computations are never cached.
pub struct Freezer<V> {
    storage: ColdStorage<V>,
    in_flight: Arc<Mutex<HashMap<String, Waiters<V>>>>,
    single_flight: bool,
}

impl<V> Clone for Freezer<V> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            in_flight: Arc::clone(&self.in_flight),
            single_flight: self.single_flight,
        }
    }
}

impl<V> fmt::Debug for Freezer<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Freezer")
            .field("single_flight", &self.single_flight)
            .field("in_flight", &self.in_flight.lock().len())
            .finish_non_exhaustive()
    }
}

impl<V> Freezer<V>
where
    V: Clone + Send + 'static,
{
    pub fn new(storage: ColdStorage<V>, single_flight: bool) -> Self {
        Self {
            storage,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            single_flight,
        }
    }

    pub fn from_config(storage: ColdStorage<V>, config: &Config) -> Self {
        Self::new(storage, config.single_flight)
    }

    /// The store this freezer reads and fills.
    pub fn storage(&self) -> &ColdStorage<V> {
        &self.storage
    }

    // == Resolve ==
    /// Returns the cached value for `key`, or runs the blocking `compute` on
    /// the blocking thread pool, caches its result and returns it.
    ///
    /// Dropping the returned future does not stop a `compute` that has
    /// already started; it runs to completion and its result is discarded.
    pub async fn resolve<F, E>(&self, key: &str, options: &FreezeOptions, compute: F) -> Result<V>
    where
        F: FnOnce() -> std::result::Result<V, E> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let operation = options.operation.clone();
        self.resolve_with(key, options, async move {
            match tokio::task::spawn_blocking(compute).await {
                Ok(outcome) => outcome.map_err(|e| ColdStorageError::failed(&operation, e)),
                Err(join_error) => Err(ColdStorageError::from_join_error(&operation, join_error)),
            }
        })
        .await
    }

    /// Like [`Freezer::resolve`] for an async computation, which runs as its
    /// own task. Dropping the returned future aborts that task.
    pub async fn resolve_async<Fut, E>(
        &self,
        key: &str,
        options: &FreezeOptions,
        compute: Fut,
    ) -> Result<V>
    where
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let operation = options.operation.clone();
        self.resolve_with(key, options, async move {
            match AbortOnDrop(tokio::spawn(compute)).await {
                Ok(outcome) => outcome.map_err(|e| ColdStorageError::failed(&operation, e)),
                Err(join_error) => Err(ColdStorageError::from_join_error(&operation, join_error)),
            }
        })
        .await
    }

    // == Freeze ==
    /// Resolves `key` on a spawned task and reports the outcome to
    /// `callback`. The caller never waits.
    ///
    /// Aborting the returned handle cancels the call: nothing is cached, the
    /// callback is never invoked and any single-flight followers receive
    /// [`ColdStorageError::Abandoned`]. A blocking `compute` that has
    /// already started still runs to completion on its worker thread.
    pub fn freeze<F, E, C>(
        &self,
        key: impl Into<String>,
        options: FreezeOptions,
        compute: F,
        callback: C,
    ) -> JoinHandle<()>
    where
        F: FnOnce() -> std::result::Result<V, E> + Send + 'static,
        E: fmt::Display + Send + 'static,
        C: OperationCallback<V>,
    {
        let freezer = self.clone();
        let key = key.into();

        tokio::spawn(async move {
            match freezer.resolve(&key, &options, compute).await {
                Ok(value) => callback.on_success(value, &options.operation),
                Err(error) => callback.on_failure(error, &options.operation),
            }
        })
    }

    // == Internal Helpers ==
    async fn resolve_with<Fut>(&self, key: &str, options: &FreezeOptions, miss: Fut) -> Result<V>
    where
        Fut: Future<Output = Result<V>>,
    {
        if !self.single_flight {
            if let Some(value) = self.storage.get(key) {
                debug!(key, operation = %options.operation, "Cache hit");
                return Ok(value);
            }
            debug!(key, operation = %options.operation, "Cache miss, computing");
            return self.compute_and_store(key, options, miss).await;
        }

        let flight = match self.join_flight(key) {
            Flight::Cached(value) => {
                debug!(key, operation = %options.operation, "Cache hit");
                return Ok(value);
            }
            Flight::Follower(receiver) => {
                debug!(key, operation = %options.operation, "Waiting on in-flight computation");
                return receiver.await.unwrap_or_else(|_| {
                    warn!(key, operation = %options.operation, "In-flight computation abandoned");
                    Err(ColdStorageError::Abandoned {
                        operation: options.operation.clone(),
                    })
                });
            }
            Flight::Leader(guard) => guard,
        };

        debug!(key, operation = %options.operation, "Cache miss, computing");
        let outcome = self.compute_and_store(key, options, miss).await;

        for waiter in flight.complete() {
            let _ = waiter.send(outcome.clone());
        }
        outcome
    }

    async fn compute_and_store<Fut>(&self, key: &str, options: &FreezeOptions, miss: Fut) -> Result<V>
    where
        Fut: Future<Output = Result<V>>,
    {
        match miss.await {
            Ok(value) => {
                self.storage.put(key, value.clone(), options.time_to_live);
                Ok(value)
            }
            Err(error) => {
                warn!(
                    key,
                    operation = error.operation().unwrap_or(options.operation.as_str()),
                    %error,
                    "Computation failed, nothing cached"
                );
                Err(error)
            }
        }
    }

    /// Looks `key` up, and on a miss either becomes its leader or subscribes
    /// to the current leader.
    fn join_flight(&self, key: &str) -> Flight<'_, V> {
        // Held across the lookup so a leader cannot store and leave unseen.
        let mut in_flight = self.in_flight.lock();

        if let Some(value) = self.storage.get(key) {
            return Flight::Cached(value);
        }

        match in_flight.get_mut(key) {
            Some(waiters) => {
                let (sender, receiver) = oneshot::channel();
                waiters.push(sender);
                Flight::Follower(receiver)
            }
            None => {
                in_flight.insert(key.to_string(), Vec::new());
                Flight::Leader(FlightGuard {
                    in_flight: &self.in_flight,
                    key: Some(key.to_string()),
                })
            }
        }
    }
}

/// Aborts the wrapped task when dropped before it finished.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Future for AbortOnDrop<T> {
    type Output = std::result::Result<T, tokio::task::JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0).poll(cx)
    }
}

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

enum Flight<'a, V> {
    Cached(V),
    Follower(oneshot::Receiver<Result<V>>),
    Leader(FlightGuard<'a, V>),
}

/// Leader's claim on a key. Dropping it without `complete` (the leader was
/// cancelled) drops every follower's sender, which they see as abandonment.
struct FlightGuard<'a, V> {
    in_flight: &'a Mutex<HashMap<String, Waiters<V>>>,
    key: Option<String>,
}

impl<V> FlightGuard<'_, V> {
    fn complete(mut self) -> Waiters<V> {
        match self.key.take() {
            Some(key) => self.in_flight.lock().remove(&key).unwrap_or_default(),
            None => Vec::new(),
        }
    }
}

impl<V> Drop for FlightGuard<'_, V> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.in_flight.lock().remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio_test::{assert_err, assert_ok};

    fn freezer(single_flight: bool) -> Freezer<u64> {
        Freezer::new(ColdStorage::unbounded(), single_flight)
    }

    #[test]
    fn test_ttl_millis_negative_means_forever() {
        let options = FreezeOptions::new("op").with_ttl_millis(-1);
        assert_eq!(options.time_to_live, None);

        let options = FreezeOptions::new("op").with_ttl_millis(1_000);
        assert_eq!(options.time_to_live, Some(Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn test_resolve_miss_then_hit() {
        let freezer = freezer(true);
        let calls = Arc::new(AtomicUsize::new(0));
        let options = FreezeOptions::new("computeArea");

        for _ in 0..3 {
            let calls = Arc::clone(&calls);
            let value = freezer
                .resolve("area", &options, move || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(50)
                })
                .await;
            assert_eq!(assert_ok!(value), 50);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(freezer.storage().get("area"), Some(50));
    }

    #[tokio::test]
    async fn test_resolve_applies_ttl() {
        let freezer = freezer(false);
        let options = FreezeOptions::new("op").with_ttl(Duration::from_secs(30));

        assert_ok!(freezer.resolve("k", &options, || Ok::<_, String>(1)).await);

        let entry = freezer.storage().peek_entry("k").unwrap();
        assert_eq!(entry.expires_at, Some(entry.created_at + 30_000));
    }

    #[tokio::test]
    async fn test_failure_is_reported_and_not_cached() {
        let freezer = freezer(true);
        let options = FreezeOptions::new("divide");

        let err = assert_err!(
            freezer
                .resolve("k", &options, || Err::<u64, _>("division by zero"))
                .await
        );
        assert_eq!(err, ColdStorageError::failed("divide", "division by zero"));
        assert!(freezer.storage().is_empty());

        let value = freezer.resolve("k", &options, || Ok::<_, String>(3)).await;
        assert_eq!(value, Ok(3));
    }

    #[tokio::test]
    async fn test_panic_becomes_error() {
        let freezer = freezer(true);
        let options = FreezeOptions::new("explode");

        let err = freezer
            .resolve("k", &options, || -> std::result::Result<u64, String> {
                panic!("kaboom")
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ColdStorageError::OperationPanicked { .. }));
        assert!(freezer.in_flight.lock().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_async() {
        let freezer = freezer(true);
        let options = FreezeOptions::new("fetch");

        let value = freezer
            .resolve_async("k", &options, async { Ok::<_, String>(9) })
            .await;

        assert_eq!(value, Ok(9));
        assert_eq!(freezer.storage().get("k"), Some(9));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_single_flight_computes_once() {
        let freezer = freezer(true);
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let freezer = freezer.clone();
                let calls = Arc::clone(&calls);
                tokio::spawn(async move {
                    let options = FreezeOptions::new("slow");
                    freezer
                        .resolve("shared", &options, move || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(Duration::from_millis(200));
                            Ok::<_, String>(42)
                        })
                        .await
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(42));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(freezer.in_flight.lock().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_single_flight_shares_failure() {
        let freezer = freezer(true);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let freezer = freezer.clone();
                tokio::spawn(async move {
                    let options = FreezeOptions::new("flaky");
                    freezer
                        .resolve("shared", &options, || {
                            std::thread::sleep(Duration::from_millis(200));
                            Err::<u64, _>("backend down")
                        })
                        .await
                })
            })
            .collect();

        for handle in handles {
            let outcome = handle.await.unwrap();
            assert_eq!(outcome, Err(ColdStorageError::failed("flaky", "backend down")));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_followers_see_abandoned_leader() {
        let freezer = freezer(true);
        let options = FreezeOptions::new("stuck");

        let leader = {
            let freezer = freezer.clone();
            let options = options.clone();
            tokio::spawn(async move {
                freezer
                    .resolve_async("k", &options, std::future::pending::<std::result::Result<u64, String>>())
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let follower = {
            let freezer = freezer.clone();
            tokio::spawn(async move {
                freezer
                    .resolve("k", &options, || Ok::<_, String>(1))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        leader.abort();
        let outcome = follower.await.unwrap();
        assert_eq!(
            outcome,
            Err(ColdStorageError::Abandoned {
                operation: "stuck".to_string()
            })
        );
        assert!(freezer.in_flight.lock().is_empty());
    }

    /// Flips its flag when the future holding it is dropped.
    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_aborting_caller_cancels_async_computation() {
        let freezer = freezer(true);
        let dropped = Arc::new(AtomicBool::new(false));

        let caller = {
            let freezer = freezer.clone();
            let flag = DropFlag(Arc::clone(&dropped));
            tokio::spawn(async move {
                let options = FreezeOptions::new("stuck");
                freezer
                    .resolve_async("k", &options, async move {
                        let _flag = flag;
                        std::future::pending::<std::result::Result<u64, String>>().await
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!dropped.load(Ordering::SeqCst));

        caller.abort();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(dropped.load(Ordering::SeqCst), "computation outlived its caller");
        assert!(freezer.in_flight.lock().is_empty());
        assert!(freezer.storage().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_without_single_flight_each_miss_computes() {
        let freezer = freezer(false);
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..2)
            .map(|i| {
                let freezer = freezer.clone();
                let calls = Arc::clone(&calls);
                tokio::spawn(async move {
                    let options = FreezeOptions::new("slow");
                    freezer
                        .resolve("shared", &options, move || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(Duration::from_millis(200));
                            Ok::<_, String>(i)
                        })
                        .await
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(freezer.storage().get("shared").is_some());
    }

    #[tokio::test]
    async fn test_freeze_delivers_to_callback() {
        let freezer = freezer(true);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let callback = crate::memo::FnCallback(move |outcome: Result<u64>, operation: &str| {
            let _ = tx.send((outcome, operation.to_string()));
        });

        let handle = freezer.freeze(
            "computeArea",
            FreezeOptions::new("computeArea"),
            || Ok::<_, String>(50),
            callback,
        );
        handle.await.unwrap();

        let (outcome, operation) = rx.recv().await.unwrap();
        assert_eq!(outcome, Ok(50));
        assert_eq!(operation, "computeArea");
    }
}

//! Request coalescing
//!
//! At most one computation runs per key. Callers arriving while it is in
//! flight attach to it and receive a clone of the same result. The
//! computation is spawned onto the runtime, so it runs to completion even if
//! every caller goes away, and its map entry is removed as soon as it settles
//! whether it succeeded or failed.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::debug;

/// Failure shared by every caller of one coalesced computation
#[derive(Debug, Clone, Error)]
pub enum CoalesceError {
    #[error("computation failed: {0:#}")]
    Failed(Arc<anyhow::Error>),

    /// The computation task panicked or was cancelled by the runtime
    #[error("computation aborted: {0}")]
    Aborted(String),
}

type InFlight<T> = Shared<BoxFuture<'static, Result<T, CoalesceError>>>;
type InFlightMap<T> = Arc<Mutex<HashMap<String, InFlight<T>>>>;

/// Keyed single-flight executor
pub struct Coalescer<T> {
    in_flight: InFlightMap<T>,
}

impl<T> Clone for Coalescer<T> {
    fn clone(&self) -> Self {
        Self {
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

impl<T> Default for Coalescer<T> {
    fn default() -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<T> Coalescer<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `compute` for `key` unless a computation for it is already in flight
    ///
    /// `compute` is only called by the caller that starts a computation.
    ///
    /// ```
    /// use folio_isr::Coalescer;
    ///
    /// # #[tokio::main] async fn main() {
    /// let coalescer = Coalescer::new();
    /// let value = coalescer.coalesce("/a", || async { Ok::<_, anyhow::Error>(42) }).await.unwrap();
    /// assert_eq!(value, 42);
    /// assert_eq!(coalescer.in_flight_count(), 0);
    /// # }
    /// ```
    pub async fn coalesce<F, Fut>(&self, key: &str, compute: F) -> Result<T, CoalesceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        self.join(key, compute).0.await
    }

    /// Attaches to or starts the computation for `key`
    ///
    /// Returns the shared result future and whether this call started it.
    pub fn join<F, Fut>(&self, key: &str, compute: F) -> (InFlight<T>, bool)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let mut map = lock(&self.in_flight);

        if let Some(existing) = map.get(key) {
            debug!(key = %key, "joining in-flight computation");
            return (existing.clone(), false);
        }

        let work = compute();
        let settle = Settle {
            map: Arc::clone(&self.in_flight),
            key: key.to_string(),
        };
        let handle = tokio::spawn(async move {
            let _settle = settle;
            work.await.map_err(|e| CoalesceError::Failed(Arc::new(e)))
        });

        let shared = async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => Err(CoalesceError::Aborted(e.to_string())),
            }
        }
        .boxed()
        .shared();

        map.insert(key.to_string(), shared.clone());
        (shared, true)
    }

    /// Whether a computation for `key` is running
    pub fn is_in_flight(&self, key: &str) -> bool {
        lock(&self.in_flight).contains_key(key)
    }

    pub fn in_flight_count(&self) -> usize {
        lock(&self.in_flight).len()
    }
}

/// Removes the map entry when the computation task ends, including by panic
struct Settle<T> {
    map: InFlightMap<T>,
    key: String,
}

impl<T> Drop for Settle<T> {
    fn drop(&mut self) {
        lock(&self.map).remove(&self.key);
    }
}

fn lock<T>(map: &Mutex<HashMap<String, T>>) -> MutexGuard<'_, HashMap<String, T>> {
    map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

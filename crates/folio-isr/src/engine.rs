//! Regeneration cache core: lookups, coalesced regeneration and write-behind

use crate::cache::{CacheEntry, CacheStats, Revalidate};
use crate::coalesce::{CoalesceError, Coalescer};
use crate::config::{IsrConfig, StorageBackend};
use crate::storage::filesystem::FilesystemStorage;
use crate::storage::memory::MemoryStorage;
use crate::storage::Storage;
use anyhow::Result;
use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{RwLock, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Result of looking a key up
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Fresh(CacheEntry),
    /// Past its revalidation interval; still servable
    Stale(CacheEntry),
    Miss,
}

impl Lookup {
    pub fn entry(&self) -> Option<&CacheEntry> {
        match self {
            Lookup::Fresh(entry) | Lookup::Stale(entry) => Some(entry),
            Lookup::Miss => None,
        }
    }
}

/// Process-wide store of rendered pages
///
/// Cloning is cheap and clones share all state. Created with
/// [`RegenerationCache::init`] and drained with [`RegenerationCache::teardown`].
#[derive(Clone)]
pub struct RegenerationCache {
    config: IsrConfig,
    primary: Arc<dyn Storage>,
    fallback: Option<Arc<dyn Storage>>,
    coalescer: Coalescer<CacheEntry>,
    permits: Arc<Semaphore>,
    queued: Arc<Mutex<HashSet<String>>>,
    pending: Arc<Mutex<JoinSet<()>>>,
    closed: Arc<AtomicBool>,
    stats: Arc<RwLock<CacheStats>>,
}

impl RegenerationCache {
    /// Builds the configured storage backends
    pub async fn init(config: IsrConfig) -> Result<Self> {
        let primary = Self::create_storage(&config.storage).await?;

        let fallback = if let Some(ref fallback_config) = config.fallback {
            Some(Self::create_storage(fallback_config).await?)
        } else {
            None
        };

        info!(
            primary = primary.name(),
            fallback = fallback.as_ref().map(|s| s.name()).unwrap_or("none"),
            max_concurrent = config.max_concurrent_regenerations,
            "regeneration cache initialized"
        );

        Ok(Self::with_storage(config, primary, fallback))
    }

    /// A cache over already constructed backends
    pub fn with_storage(
        config: IsrConfig,
        primary: Arc<dyn Storage>,
        fallback: Option<Arc<dyn Storage>>,
    ) -> Self {
        let permits = config.max_concurrent_regenerations.max(1);
        Self {
            config,
            primary,
            fallback,
            coalescer: Coalescer::new(),
            permits: Arc::new(Semaphore::new(permits)),
            queued: Arc::new(Mutex::new(HashSet::new())),
            pending: Arc::new(Mutex::new(JoinSet::new())),
            closed: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(RwLock::new(CacheStats::default())),
        }
    }

    /// Create a storage backend from config
    async fn create_storage(backend: &StorageBackend) -> Result<Arc<dyn Storage>> {
        match backend {
            StorageBackend::Memory(config) => Ok(Arc::new(MemoryStorage::new(config.clone()))),
            StorageBackend::Filesystem(config) => {
                let storage = FilesystemStorage::new(config.clone()).await?;
                Ok(Arc::new(storage))
            }
        }
    }

    pub fn config(&self) -> &IsrConfig {
        &self.config
    }

    pub fn default_revalidate(&self) -> Revalidate {
        Revalidate::from_duration(self.config.default_revalidate)
    }

    /// Looks a key up and classifies the entry as fresh, stale or missing
    pub async fn lookup(&self, key: &str) -> Lookup {
        let lookup = match self.get(key).await {
            Some(entry) if entry.is_stale() => Lookup::Stale(entry),
            Some(entry) => Lookup::Fresh(entry),
            None => Lookup::Miss,
        };

        let mut stats = self.stats.write().await;
        match lookup {
            Lookup::Fresh(_) => stats.hits += 1,
            Lookup::Stale(_) => stats.stale_hits += 1,
            Lookup::Miss => stats.misses += 1,
        }
        debug!(key = %key, state = lookup_state(&lookup), "cache lookup");

        lookup
    }

    /// Get an entry, promoting it from the fallback backend on a primary miss
    pub async fn get(&self, key: &str) -> Option<CacheEntry> {
        match self.primary.get(key).await {
            Ok(Some(entry)) => return Some(entry),
            Ok(None) => {}
            Err(e) => warn!(key = %key, backend = self.primary.name(), error = %e, "cache read failed"),
        }

        let fallback = self.fallback.as_ref()?;
        match fallback.get(key).await {
            Ok(Some(entry)) => {
                debug!(key = %key, "promoting entry from {}", fallback.name());
                if let Err(e) = self.primary.set(entry.clone()).await {
                    warn!(key = %key, error = %e, "promotion failed");
                }
                Some(entry)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(key = %key, backend = fallback.name(), error = %e, "cache read failed");
                None
            }
        }
    }

    /// Regenerates `key` and waits for the result
    ///
    /// Concurrent calls for the same key share one `generate` run. The run
    /// that produces the entry also stores it, so the store is written once
    /// per regeneration no matter how many callers waited. A failed run
    /// leaves any existing entry untouched.
    pub async fn regenerate<F, Fut>(&self, key: &str, generate: F) -> Result<CacheEntry, CoalesceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CacheEntry>> + Send + 'static,
    {
        let this = self.clone();
        let owned_key = key.to_string();

        self.coalescer
            .coalesce(key, move || {
                let work = generate();
                async move {
                    debug!(key = %owned_key, "regeneration started");
                    match work.await {
                        Ok(mut entry) => {
                            entry.key = owned_key;
                            this.store(entry).await
                        }
                        Err(e) => {
                            this.stats.write().await.failures += 1;
                            warn!(key = %owned_key, error = %e, "regeneration failed");
                            Err(e)
                        }
                    }
                }
            })
            .await
    }

    /// Computes a preview render through the coalescer without touching the store
    pub async fn compute_preview<F, Fut>(&self, key: &str, generate: F) -> Result<CacheEntry, CoalesceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CacheEntry>> + Send + 'static,
    {
        self.coalescer.coalesce(&preview_key(key), generate).await
    }

    /// Schedules a regeneration without waiting for it
    ///
    /// Background regenerations share a global permit pool of
    /// `max_concurrent_regenerations`. Returns `false` when the key is already
    /// queued or regenerating, or the cache has been torn down.
    pub fn revalidate_in_background<F, Fut>(&self, key: &str, generate: F) -> bool
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<CacheEntry>> + Send + 'static,
    {
        if self.closed.load(Ordering::SeqCst) {
            debug!(key = %key, "cache closed; skipping background regeneration");
            return false;
        }
        if self.coalescer.is_in_flight(key) || !lock(&self.queued).insert(key.to_string()) {
            return false;
        }

        let this = self.clone();
        let key = key.to_string();
        self.spawn_pending(async move {
            if let Ok(_permit) = Arc::clone(&this.permits).acquire_owned().await {
                if let Err(e) = this.regenerate(&key, generate).await {
                    warn!(key = %key, error = %e, "background regeneration failed; keeping existing entry");
                }
            }
            lock(&this.queued).remove(&key);
        });
        true
    }

    /// Whether a regeneration for `key` is queued or running
    pub fn is_regenerating(&self, key: &str) -> bool {
        self.coalescer.is_in_flight(key) || lock(&self.queued).contains(key)
    }

    /// Writes an entry directly, as when warming the cache after a build
    pub async fn set(&self, entry: CacheEntry) -> Result<()> {
        self.store(entry).await.map(|_| ())
    }

    async fn store(&self, mut entry: CacheEntry) -> Result<CacheEntry> {
        if let Ok(Some(previous)) = self.primary.get(&entry.key).await {
            entry.metadata.regenerations = previous.metadata.regenerations + 1;
        }

        self.primary.set(entry.clone()).await?;

        if let Some(fallback) = &self.fallback {
            let fallback = Arc::clone(fallback);
            let copy = entry.clone();
            self.spawn_pending(async move {
                let key = copy.key.clone();
                if let Err(e) = fallback.set(copy).await {
                    warn!(key = %key, backend = fallback.name(), error = %e, "write-behind failed");
                }
            });
        }

        self.stats.write().await.regenerations += 1;
        info!(key = %entry.key, generation = entry.metadata.regenerations, "cache entry written");
        Ok(entry)
    }

    /// Drops an entry from every backend
    pub async fn invalidate(&self, key: &str) -> Result<()> {
        self.primary.delete(key).await?;

        if let Some(ref fallback) = self.fallback {
            fallback.delete(key).await.ok();
        }

        info!(key = %key, "cache entry invalidated");
        Ok(())
    }

    /// Clear all entries and reset statistics
    pub async fn clear(&self) -> Result<()> {
        self.primary.clear().await?;

        if let Some(ref fallback) = self.fallback {
            fallback.clear().await.ok();
        }

        *self.stats.write().await = CacheStats::default();
        Ok(())
    }

    /// Get cache statistics
    pub async fn stats(&self) -> CacheStats {
        self.stats.read().await.clone()
    }

    /// Get all cached keys from the primary backend
    pub async fn keys(&self) -> Result<Vec<String>> {
        self.primary.keys().await
    }

    /// Stops accepting background work and waits for queued regenerations
    /// and pending disk writes to finish
    pub async fn teardown(&self) {
        self.closed.store(true, Ordering::SeqCst);

        loop {
            let mut tasks = std::mem::take(&mut *lock(&self.pending));
            if tasks.is_empty() {
                break;
            }
            while let Some(result) = tasks.join_next().await {
                if let Err(e) = result {
                    warn!(error = %e, "background task ended abnormally");
                }
            }
        }

        info!("regeneration cache torn down");
    }

    fn spawn_pending<Fut>(&self, task: Fut)
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut pending = lock(&self.pending);
        while pending.try_join_next().is_some() {}
        pending.spawn(task);
    }
}

/// Key under which preview renders are coalesced, apart from published renders
pub fn preview_key(key: &str) -> String {
    format!("preview:{}", key)
}

fn lookup_state(lookup: &Lookup) -> &'static str {
    match lookup {
        Lookup::Fresh(_) => "fresh",
        Lookup::Stale(_) => "stale",
        Lookup::Miss => "miss",
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

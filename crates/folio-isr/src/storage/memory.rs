//! In-memory storage backend

use crate::cache::CacheEntry;
use crate::config::MemoryConfig;
use crate::storage::Storage;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// In-memory storage backend
///
/// Byte-bounded: once the stored entries exceed the configured budget, the
/// least recently read or written entries are evicted. Non-persistent.
#[derive(Clone)]
pub struct MemoryStorage {
    state: Arc<Mutex<LruState>>,
    max_bytes: usize,
}

#[derive(Default)]
struct LruState {
    entries: HashMap<String, Slot>,
    total_bytes: usize,
    clock: u64,
}

struct Slot {
    entry: CacheEntry,
    last_used: u64,
}

impl LruState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn evict_to(&mut self, max_bytes: usize, keep: &str) {
        while self.total_bytes > max_bytes {
            let victim = self
                .entries
                .iter()
                .filter(|(key, _)| key.as_str() != keep)
                .min_by_key(|(_, slot)| slot.last_used)
                .map(|(key, _)| key.clone());

            let Some(victim) = victim else { break };
            if let Some(slot) = self.entries.remove(&victim) {
                self.total_bytes -= slot.entry.size_bytes();
                debug!(key = %victim, "evicted from memory cache");
            }
        }
    }
}

impl MemoryStorage {
    /// Create a new memory storage backend
    pub fn new(config: MemoryConfig) -> Self {
        Self::with_max_bytes((config.max_size_mb as usize).saturating_mul(1024 * 1024))
    }

    /// Memory storage with an exact byte budget
    pub fn with_max_bytes(max_bytes: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(LruState::default())),
            max_bytes,
        }
    }

    /// Get cache size (number of entries)
    pub async fn size(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    /// Get total bytes stored
    pub async fn total_bytes(&self) -> usize {
        self.state.lock().await.total_bytes
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new(MemoryConfig::default())
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let mut state = self.state.lock().await;
        let now = state.tick();
        Ok(state.entries.get_mut(key).map(|slot| {
            slot.last_used = now;
            slot.entry.clone()
        }))
    }

    async fn set(&self, entry: CacheEntry) -> Result<()> {
        let mut state = self.state.lock().await;
        let now = state.tick();
        let key = entry.key.clone();
        let size = entry.size_bytes();

        if let Some(old) = state.entries.insert(
            key.clone(),
            Slot {
                entry,
                last_used: now,
            },
        ) {
            state.total_bytes -= old.entry.size_bytes();
        }
        state.total_bytes += size;
        state.evict_to(self.max_bytes, &key);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(slot) = state.entries.remove(key) {
            state.total_bytes -= slot.entry.size_bytes();
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.state.lock().await.entries.contains_key(key))
    }

    async fn clear(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.entries.clear();
        state.total_bytes = 0;
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().await.entries.keys().cloned().collect())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

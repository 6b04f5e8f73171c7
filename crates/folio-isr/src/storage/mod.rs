//! Storage backends for the regeneration cache

use crate::cache::CacheEntry;
use anyhow::Result;
use async_trait::async_trait;

pub mod filesystem;
pub mod memory;

/// Trait for cache storage backends
///
/// `set` replaces an entry as a whole; readers observe either the previous
/// entry or the new one.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Get a cached entry by key
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>>;

    /// Store an entry under its own key
    async fn set(&self, entry: CacheEntry) -> Result<()>;

    /// Delete a cached entry
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if a key exists
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Clear all cached entries
    async fn clear(&self) -> Result<()>;

    /// Get all cache keys
    async fn keys(&self) -> Result<Vec<String>>;

    /// Get storage backend name
    fn name(&self) -> &'static str;
}

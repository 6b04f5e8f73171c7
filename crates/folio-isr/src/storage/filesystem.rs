//! Filesystem storage backend

use crate::cache::CacheEntry;
use crate::config::FilesystemConfig;
use crate::storage::Storage;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;
use walkdir::WalkDir;

/// Filesystem storage backend
///
/// Stores one JSON file per entry. Persistent across restarts, suitable for
/// single-instance deployments. Each write goes to its own temporary file that
/// is renamed into place, so a reader never sees a half-written entry.
#[derive(Clone)]
pub struct FilesystemStorage {
    config: FilesystemConfig,
    /// Writers take turns so an older entry never replaces a newer one
    writes: Arc<Mutex<()>>,
}

impl FilesystemStorage {
    /// Create a new filesystem storage backend
    pub async fn new(config: FilesystemConfig) -> Result<Self> {
        fs::create_dir_all(&config.path)
            .await
            .with_context(|| format!("Failed to create cache directory {}", config.path.display()))?;

        Ok(Self {
            config,
            writes: Arc::new(Mutex::new(())),
        })
    }

    /// Get the file path for a cache key
    fn key_to_path(&self, key: &str) -> PathBuf {
        self.config
            .path
            .join(format!("{}.json", urlencoding::encode(key)))
    }

    fn path_to_key(path: &Path) -> Option<String> {
        if !is_entry_file(path) {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        urlencoding::decode(stem).ok().map(|k| k.into_owned())
    }

    /// Size of all stored entries in bytes
    ///
    /// Temporary files of writes in progress are not counted.
    pub fn total_size_bytes(&self) -> u64 {
        WalkDir::new(&self.config.path)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && is_entry_file(e.path()))
            .filter_map(|e| e.metadata().ok())
            .map(|m| m.len())
            .sum()
    }

    fn max_bytes(&self) -> u64 {
        self.config.max_size_mb.saturating_mul(1024 * 1024)
    }

    /// Evict least recently accessed entries until under the size limit
    pub async fn evict_if_needed(&self) -> Result<()> {
        let mut total = self.total_size_bytes();
        if total <= self.max_bytes() {
            return Ok(());
        }

        let mut entries: Vec<(PathBuf, std::time::SystemTime, u64)> = WalkDir::new(&self.config.path)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && is_entry_file(e.path()))
            .filter_map(|e| {
                let metadata = e.metadata().ok()?;
                let accessed = metadata.accessed().or_else(|_| metadata.modified()).ok()?;
                Some((e.path().to_path_buf(), accessed, metadata.len()))
            })
            .collect();

        // Oldest first
        entries.sort_by_key(|(_, time, _)| *time);

        for (path, _, len) in entries {
            if total <= self.max_bytes() {
                break;
            }
            if fs::remove_file(&path).await.is_ok() {
                debug!(path = %path.display(), "evicted from filesystem cache");
                total = total.saturating_sub(len);
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Storage for FilesystemStorage {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let path = self.key_to_path(key);

        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).context("Failed to read cache file"),
        };

        let entry: CacheEntry =
            serde_json::from_str(&content).context("Failed to deserialize cache entry")?;

        Ok(Some(entry))
    }

    async fn set(&self, entry: CacheEntry) -> Result<()> {
        let _turn = self.writes.lock().await;

        if let Ok(Some(current)) = self.get(&entry.key).await {
            if current.generated_at > entry.generated_at {
                debug!(key = %entry.key, "newer entry already on disk; write skipped");
                return Ok(());
            }
        }

        let path = self.key_to_path(&entry.key);
        let dir = self.config.path.clone();
        let json = serde_json::to_vec(&entry).context("Failed to serialize cache entry")?;

        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut file = tempfile::Builder::new()
                .prefix(".entry-")
                .suffix(".tmp")
                .tempfile_in(&dir)
                .context("Failed to create temporary cache file")?;
            file.write_all(&json).context("Failed to write cache file")?;
            file.persist(&path)
                .context("Failed to move cache file into place")?;
            Ok(())
        })
        .await
        .context("Cache write task failed")??;

        self.evict_if_needed().await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.key_to_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context("Failed to delete cache file"),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(fs::try_exists(self.key_to_path(key)).await.unwrap_or(false))
    }

    async fn clear(&self) -> Result<()> {
        let mut entries = fs::read_dir(&self.config.path)
            .await
            .context("Failed to read cache directory")?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.is_file() && is_entry_file(&path) {
                fs::remove_file(&path).await.ok();
            }
        }

        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut entries = fs::read_dir(&self.config.path)
            .await
            .context("Failed to read cache directory")?;

        while let Some(entry) = entries.next_entry().await? {
            if let Some(key) = Self::path_to_key(&entry.path()) {
                keys.push(key);
            }
        }

        Ok(keys)
    }

    fn name(&self) -> &'static str {
        "filesystem"
    }
}

fn is_entry_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Revalidate;
    use serde_json::json;
    use tempfile::TempDir;

    fn config(dir: &TempDir, max_size_mb: u64) -> FilesystemConfig {
        FilesystemConfig {
            path: dir.path().to_path_buf(),
            max_size_mb,
        }
    }

    #[tokio::test]
    async fn test_filesystem_storage_basic() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FilesystemStorage::new(config(&temp_dir, 100)).await.unwrap();

        let entry = CacheEntry::new("/blog/a", "<h1>a</h1>", json!({"post": "a"}), Revalidate::After(60));
        storage.set(entry.clone()).await.unwrap();

        let retrieved = storage.get("/blog/a").await.unwrap().unwrap();
        assert_eq!(retrieved, entry);

        assert!(storage.exists("/blog/a").await.unwrap());
        assert_eq!(storage.keys().await.unwrap(), vec!["/blog/a".to_string()]);

        storage.delete("/blog/a").await.unwrap();
        assert!(!storage.exists("/blog/a").await.unwrap());
        assert!(storage.get("/blog/a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_filesystem_storage_persistence() {
        let temp_dir = TempDir::new().unwrap();

        {
            let storage = FilesystemStorage::new(config(&temp_dir, 100)).await.unwrap();
            storage
                .set(CacheEntry::new("/", "persistent", json!(null), Revalidate::Never))
                .await
                .unwrap();
        }

        // New instance, as after a restart
        {
            let storage = FilesystemStorage::new(config(&temp_dir, 100)).await.unwrap();
            let retrieved = storage.get("/").await.unwrap().unwrap();
            assert_eq!(retrieved.markup, "persistent");
            assert_eq!(retrieved.revalidate, Revalidate::Never);
        }
    }

    #[tokio::test]
    async fn test_zero_budget_evicts() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FilesystemStorage::new(config(&temp_dir, 0)).await.unwrap();

        storage
            .set(CacheEntry::new("/a", "x", json!(null), Revalidate::Never))
            .await
            .unwrap();
        assert_eq!(storage.total_size_bytes(), 0);
    }

    #[tokio::test]
    async fn test_older_entry_does_not_replace_newer() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FilesystemStorage::new(config(&temp_dir, 100)).await.unwrap();

        let newer = CacheEntry::new("/a", "v2", json!(null), Revalidate::After(60));
        let mut older = CacheEntry::new("/a", "v1", json!(null), Revalidate::After(60));
        older.generated_at = newer.generated_at - chrono::Duration::seconds(10);

        storage.set(newer).await.unwrap();
        storage.set(older).await.unwrap();

        assert_eq!(storage.get("/a").await.unwrap().unwrap().markup, "v2");
    }

    #[tokio::test]
    async fn test_concurrent_writes_for_one_key() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FilesystemStorage::new(config(&temp_dir, 100)).await.unwrap();

        let writes = (0..20).map(|i| {
            let storage = storage.clone();
            tokio::spawn(async move {
                storage
                    .set(CacheEntry::new("/a", format!("v{}", i), json!(null), Revalidate::Never))
                    .await
            })
        });
        for result in futures::future::join_all(writes).await {
            result.unwrap().unwrap();
        }

        assert!(storage.get("/a").await.unwrap().unwrap().markup.starts_with('v'));
        let leftovers = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_eviction_skips_writes_in_progress() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FilesystemStorage::new(config(&temp_dir, 0)).await.unwrap();
        let pending = temp_dir.path().join(".entry-pending.tmp");
        std::fs::write(&pending, "partial").unwrap();

        storage
            .set(CacheEntry::new("/a", "x", json!(null), Revalidate::Never))
            .await
            .unwrap();

        assert!(pending.exists());
        assert_eq!(storage.keys().await.unwrap(), Vec::<String>::new());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FilesystemStorage::new(config(&temp_dir, 100)).await.unwrap();
        std::fs::write(temp_dir.path().join("%2Fbad.json"), "not json").unwrap();

        assert!(storage.get("/bad").await.is_err());
    }
}

//! Regeneration cache configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for [`crate::RegenerationCache`]
#[derive(Debug, Clone)]
pub struct IsrConfig {
    /// Revalidation period for pages that do not declare their own
    pub default_revalidate: Duration,

    /// Upper bound on background regenerations running at once
    pub max_concurrent_regenerations: usize,

    /// Primary storage backend
    pub storage: StorageBackend,

    /// Optional secondary backend, written behind the primary
    pub fallback: Option<Box<StorageBackend>>,
}

impl Default for IsrConfig {
    fn default() -> Self {
        Self {
            default_revalidate: Duration::from_secs(60),
            max_concurrent_regenerations: 8,
            storage: StorageBackend::Memory(MemoryConfig::default()),
            fallback: None,
        }
    }
}

/// Storage backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageBackend {
    /// In-memory storage (fast, non-persistent)
    Memory(MemoryConfig),

    /// Filesystem storage (persistent, single-instance)
    Filesystem(FilesystemConfig),
}

/// In-memory storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Size budget in megabytes; least recently used entries are evicted past it
    pub max_size_mb: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self { max_size_mb: 100 }
    }
}

/// Filesystem storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesystemConfig {
    /// Cache directory path
    pub path: PathBuf,

    /// Maximum cache size in megabytes
    pub max_size_mb: u64,
}

impl Default for FilesystemConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".folio/cache"),
            max_size_mb: 500,
        }
    }
}

/// `[isr]` section of folio.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IsrTomlConfig {
    /// Default revalidation period in seconds
    pub default_revalidate: u64,

    pub max_concurrent_regenerations: usize,

    /// Storage configuration
    pub storage: StorageTomlConfig,
}

impl Default for IsrTomlConfig {
    fn default() -> Self {
        Self {
            default_revalidate: 60,
            max_concurrent_regenerations: 8,
            storage: StorageTomlConfig::default(),
        }
    }
}

/// `[isr.storage]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageTomlConfig {
    /// Primary storage backend: "memory" or "filesystem"
    pub primary: String,

    /// Optional fallback storage backend
    pub fallback: Option<String>,

    pub memory: Option<MemoryConfig>,

    pub filesystem: Option<FilesystemConfig>,
}

impl Default for StorageTomlConfig {
    fn default() -> Self {
        Self {
            primary: "memory".to_string(),
            fallback: None,
            memory: None,
            filesystem: None,
        }
    }
}

impl IsrTomlConfig {
    /// Convert TOML config to runtime config
    pub fn to_runtime_config(&self) -> anyhow::Result<IsrConfig> {
        if self.max_concurrent_regenerations == 0 {
            anyhow::bail!("isr.max_concurrent_regenerations must be at least 1");
        }

        let storage = self.parse_storage_backend(&self.storage.primary)?;

        let fallback = if let Some(ref fallback_type) = self.storage.fallback {
            Some(Box::new(self.parse_storage_backend(fallback_type)?))
        } else {
            None
        };

        Ok(IsrConfig {
            default_revalidate: Duration::from_secs(self.default_revalidate),
            max_concurrent_regenerations: self.max_concurrent_regenerations,
            storage,
            fallback,
        })
    }

    fn parse_storage_backend(&self, backend_type: &str) -> anyhow::Result<StorageBackend> {
        match backend_type {
            "memory" => Ok(StorageBackend::Memory(
                self.storage.memory.clone().unwrap_or_default(),
            )),
            "filesystem" => Ok(StorageBackend::Filesystem(
                self.storage.filesystem.clone().unwrap_or_default(),
            )),
            _ => Err(anyhow::anyhow!("Unknown storage backend: {}", backend_type)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_toml_is_memory_only() {
        let config = IsrTomlConfig::default().to_runtime_config().unwrap();
        assert!(matches!(config.storage, StorageBackend::Memory(_)));
        assert!(config.fallback.is_none());
        assert_eq!(config.default_revalidate, Duration::from_secs(60));
    }

    #[test]
    fn test_filesystem_fallback() {
        let toml = IsrTomlConfig {
            storage: StorageTomlConfig {
                fallback: Some("filesystem".to_string()),
                filesystem: Some(FilesystemConfig {
                    path: PathBuf::from("/tmp/folio-cache"),
                    max_size_mb: 10,
                }),
                ..Default::default()
            },
            ..Default::default()
        };

        let config = toml.to_runtime_config().unwrap();
        match config.fallback.as_deref() {
            Some(StorageBackend::Filesystem(fs)) => assert_eq!(fs.max_size_mb, 10),
            other => panic!("unexpected fallback {:?}", other),
        }
    }

    #[test]
    fn test_unknown_backend_and_zero_cap_rejected() {
        let mut toml = IsrTomlConfig::default();
        toml.storage.primary = "redis".to_string();
        assert!(toml.to_runtime_config().is_err());

        let toml = IsrTomlConfig {
            max_concurrent_regenerations: 0,
            ..Default::default()
        };
        assert!(toml.to_runtime_config().is_err());
    }
}

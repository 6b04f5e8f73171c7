// File: src/config.rs
// Purpose: Configuration parsing from folio.toml

use anyhow::{Context, Result};
use folio_isr::IsrTomlConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub isr: IsrTomlConfig,

    #[serde(default)]
    pub preview: PreviewConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Development mode: no cache reads, no Cache-Control headers
    #[serde(default)]
    pub dev: bool,
}

/// Build configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Identifies one build; data routes embed it
    #[serde(default = "default_build_id")]
    pub build_id: String,

    /// Build output: manifests and `static/` assets
    #[serde(default = "default_dist_dir")]
    pub dist_dir: PathBuf,

    /// Files served as-is from the site root
    #[serde(default = "default_public_dir")]
    pub public_dir: PathBuf,

    /// Concurrent path enumerations during a build
    #[serde(default = "default_workers")]
    pub workers: usize,
}

/// Preview (draft) mode configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewConfig {
    #[serde(default = "default_bypass_cookie")]
    pub bypass_cookie: String,

    /// Preview is disabled while unset
    #[serde(default)]
    pub secret: Option<String>,
}

// Default values
fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_build_id() -> String {
    "development".to_string()
}

fn default_dist_dir() -> PathBuf {
    PathBuf::from(".folio")
}

fn default_public_dir() -> PathBuf {
    PathBuf::from("public")
}

fn default_workers() -> usize {
    4
}

fn default_bypass_cookie() -> String {
    "__folio_preview".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            dev: false,
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            build_id: default_build_id(),
            dist_dir: default_dist_dir(),
            public_dir: default_public_dir(),
            workers: default_workers(),
        }
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            bypass_cookie: default_bypass_cookie(),
            secret: None,
        }
    }
}

impl Config {
    /// Load configuration from folio.toml file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load configuration from the default location (./folio.toml)
    pub fn load_default() -> Result<Self> {
        Self::load("folio.toml")
    }

    /// Applies `FOLIO_PORT` and `FOLIO_DEV` from an environment lookup
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("FOLIO_PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("FOLIO_PORT is not a port: {}", port))?;
        }
        if let Some(dev) = lookup("FOLIO_DEV") {
            self.server.dev = matches!(dev.as_str(), "1" | "true" | "yes");
        }
        Ok(self)
    }

    /// Server address as host:port
    pub fn address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Whether a cookie value unlocks preview mode
    pub fn is_preview_token(&self, value: &str) -> bool {
        matches!(&self.preview.secret, Some(secret) if !secret.is_empty() && secret == value)
    }
}

//! The routes manifest
//!
//! Header, redirect and rewrite rules are fixed at build time and written to
//! `routes-manifest.json` next to the build output. Every rule carries its
//! compiled regex so other tooling can match without reimplementing the
//! template syntax.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, RouteError};
use crate::route::RoutePattern;
use crate::rule::{HeaderRule, RedirectRule, RewriteRule};

/// File name of the routes manifest inside the build directory
pub const ROUTES_MANIFEST: &str = "routes-manifest.json";

/// Current manifest format version
pub const MANIFEST_VERSION: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutesManifest {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub headers: Vec<HeaderRule>,
    #[serde(default)]
    pub redirects: Vec<RedirectRule>,
    #[serde(default)]
    pub rewrites: Vec<RewriteRule>,
}

fn default_version() -> u32 {
    MANIFEST_VERSION
}

impl Default for RoutesManifest {
    fn default() -> Self {
        Self {
            version: MANIFEST_VERSION,
            headers: Vec::new(),
            redirects: Vec::new(),
            rewrites: Vec::new(),
        }
    }
}

impl RoutesManifest {
    pub fn with_header(mut self, rule: HeaderRule) -> Self {
        self.headers.push(rule);
        self
    }

    pub fn with_redirect(mut self, rule: RedirectRule) -> Self {
        self.redirects.push(rule);
        self
    }

    pub fn with_rewrite(mut self, rule: RewriteRule) -> Self {
        self.rewrites.push(rule);
        self
    }

    /// Validates every rule and fills in its `regex` field
    pub fn compiled(mut self) -> Result<Self> {
        for rule in &mut self.headers {
            rule.regex = Some(RoutePattern::compile_rule(&rule.source)?.regex_source().to_string());
        }
        for rule in &mut self.redirects {
            rule.status()?;
            rule.regex = Some(RoutePattern::compile_rule(&rule.source)?.regex_source().to_string());
        }
        for rule in &mut self.rewrites {
            rule.regex = Some(RoutePattern::compile_rule(&rule.source)?.regex_source().to_string());
        }
        Ok(self)
    }

    /// Reads `routes-manifest.json` from a build directory
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(ROUTES_MANIFEST);
        let content = fs::read_to_string(&path)
            .map_err(|e| RouteError::Manifest(format!("{}: {}", path.display(), e)))?;
        let manifest: Self = serde_json::from_str(&content)
            .map_err(|e| RouteError::Manifest(format!("{}: {}", path.display(), e)))?;

        if manifest.version > MANIFEST_VERSION {
            return Err(RouteError::Manifest(format!(
                "{}: unsupported version {}",
                path.display(),
                manifest.version
            )));
        }

        debug!(
            path = %path.display(),
            headers = manifest.headers.len(),
            redirects = manifest.redirects.len(),
            rewrites = manifest.rewrites.len(),
            "loaded routes manifest"
        );
        Ok(manifest)
    }

    /// Writes the compiled manifest to a build directory
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir).map_err(|e| RouteError::Manifest(e.to_string()))?;
        let json = serde_json::to_string_pretty(&self.clone().compiled()?)
            .map_err(|e| RouteError::Manifest(e.to_string()))?;
        fs::write(dir.join(ROUTES_MANIFEST), json).map_err(|e| RouteError::Manifest(e.to_string()))
    }
}

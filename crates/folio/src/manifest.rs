// File: src/manifest.rs
// Purpose: The prerender manifest written by the build and read at server start

use crate::error::{FolioError, Result};
use crate::fallback::PrerenderedPathSet;
use crate::strategy::FallbackMode;
use folio_isr::Revalidate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use tracing::debug;

/// File name of the prerender manifest inside the build directory
pub const PRERENDER_MANIFEST: &str = "prerender-manifest.json";

pub const PRERENDER_VERSION: u32 = 4;

/// One path generated ahead of time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrerenderRoute {
    /// `false` when the entry is never revalidated
    pub initial_revalidate_seconds: Revalidate,
    /// Page template the path was generated from, for dynamic pages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_route: Option<String>,
    pub data_route: String,
}

/// A dynamic regenerated page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicPrerenderRoute {
    pub fallback: FallbackMode,
    pub route_regex: String,
    pub data_route: String,
    pub data_route_regex: String,
}

/// Regenerated paths and dynamic pages known at build time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrerenderManifest {
    #[serde(default = "default_version")]
    pub version: u32,
    /// Concrete path → entry
    #[serde(default)]
    pub routes: BTreeMap<String, PrerenderRoute>,
    /// Page template → entry
    #[serde(default)]
    pub dynamic_routes: BTreeMap<String, DynamicPrerenderRoute>,
}

fn default_version() -> u32 {
    PRERENDER_VERSION
}

impl Default for PrerenderManifest {
    fn default() -> Self {
        Self {
            version: PRERENDER_VERSION,
            routes: BTreeMap::new(),
            dynamic_routes: BTreeMap::new(),
        }
    }
}

impl PrerenderManifest {
    /// Reads `prerender-manifest.json` from a build directory
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(PRERENDER_MANIFEST);
        let content = fs::read_to_string(&path)
            .map_err(|e| FolioError::Manifest(format!("{}: {}", path.display(), e)))?;
        let manifest: Self = serde_json::from_str(&content)
            .map_err(|e| FolioError::Manifest(format!("{}: {}", path.display(), e)))?;

        if manifest.version > PRERENDER_VERSION {
            return Err(FolioError::Manifest(format!(
                "{}: unsupported version {}",
                path.display(),
                manifest.version
            )));
        }

        debug!(
            path = %path.display(),
            routes = manifest.routes.len(),
            dynamic = manifest.dynamic_routes.len(),
            "loaded prerender manifest"
        );
        Ok(manifest)
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir).map_err(|e| FolioError::Manifest(e.to_string()))?;
        let json = serde_json::to_string_pretty(self).map_err(|e| FolioError::Manifest(e.to_string()))?;
        fs::write(dir.join(PRERENDER_MANIFEST), json).map_err(|e| FolioError::Manifest(e.to_string()))
    }

    /// Prerendered paths and fallback mode of every dynamic page
    pub fn path_sets(&self) -> HashMap<String, PrerenderedPathSet> {
        let mut sets: HashMap<String, PrerenderedPathSet> = self
            .dynamic_routes
            .iter()
            .map(|(template, route)| (template.clone(), PrerenderedPathSet::new(route.fallback)))
            .collect();

        for (path, route) in &self.routes {
            if let Some(set) = route.src_route.as_ref().and_then(|src| sets.get_mut(src)) {
                set.insert(path);
            }
        }
        sets
    }
}

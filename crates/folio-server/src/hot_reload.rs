use anyhow::Result;
use folio::manifest::PRERENDER_MANIFEST;
use folio::folio_router::manifest::ROUTES_MANIFEST;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;
use tracing::{error, info};

/// Which manifest changed
#[derive(Debug, Clone, PartialEq)]
pub enum ManifestKind {
    Routes,
    Prerender,
}

/// Represents a manifest change event
#[derive(Debug, Clone)]
pub struct ManifestChange {
    pub path: PathBuf,
    pub kind: ManifestKind,
}

/// Watches the build directory for rewritten manifests
pub struct ManifestWatcher {
    tx: broadcast::Sender<ManifestChange>,
    _watcher: notify::RecommendedWatcher,
}

impl ManifestWatcher {
    /// Create a watcher over `dist_dir`, creating the directory if needed
    pub fn new(dist_dir: &Path) -> Result<Self> {
        let (tx, _) = broadcast::channel(16);
        let tx_clone = tx.clone();

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| match res {
            Ok(event) => {
                if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                    return;
                }
                for path in event.paths {
                    let Some(kind) = classify(&path) else { continue };
                    info!(path = %path.display(), kind = ?kind, "manifest changed");
                    // No receivers is fine
                    let _ = tx_clone.send(ManifestChange { path, kind });
                }
            }
            Err(e) => error!(error = %e, "watch error"),
        })?;

        std::fs::create_dir_all(dist_dir)?;
        watcher.watch(dist_dir, RecursiveMode::NonRecursive)?;
        info!(dir = %dist_dir.display(), "watching build output");

        Ok(Self {
            tx,
            _watcher: watcher,
        })
    }

    /// Subscribe to manifest change events
    pub fn subscribe(&self) -> broadcast::Receiver<ManifestChange> {
        self.tx.subscribe()
    }
}

/// Manifest kind of a changed file, if it is one
pub fn classify(path: &Path) -> Option<ManifestKind> {
    match path.file_name()?.to_str()? {
        ROUTES_MANIFEST => Some(ManifestKind::Routes),
        PRERENDER_MANIFEST => Some(ManifestKind::Prerender),
        _ => None,
    }
}

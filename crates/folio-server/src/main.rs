mod hot_reload;
mod pages;

use anyhow::Context;
use folio::{App, Builder, Config};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::hot_reload::{ManifestKind, ManifestWatcher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load_default()
        .context("failed to load folio.toml")?
        .with_env_overrides(|key| std::env::var(key).ok())?;

    let loader = Arc::new(pages::registry());
    let dist_dir = config.build.dist_dir.clone();

    // `folio-server build` writes the manifests and exits
    if std::env::args().nth(1).as_deref() == Some("build") {
        let isr = config.isr.to_runtime_config()?;
        Builder::new(loader, config.build.build_id.clone())
            .with_workers(config.build.workers)
            .with_default_revalidate(folio::Revalidate::from_duration(isr.default_revalidate))
            .with_routes_manifest(pages::routes())
            .build_to(&dist_dir)
            .await?;
        return Ok(());
    }

    let mut builder = App::builder(config.clone(), loader);
    if !dist_dir.join(folio::folio_router::manifest::ROUTES_MANIFEST).exists() {
        builder = builder.with_routes(pages::routes());
    }
    let app = builder.init().await?;

    if config.server.dev {
        spawn_manifest_watcher(app.clone(), &dist_dir);
    } else {
        let warmed = app.warm().await;
        info!(entries = warmed, "cache warmed from prerender manifest");
    }

    folio::serve(app, shutdown_signal()).await
}

fn spawn_manifest_watcher(app: App, dist_dir: &std::path::Path) {
    let watcher = match ManifestWatcher::new(dist_dir) {
        Ok(watcher) => watcher,
        Err(e) => {
            warn!(error = %e, "manifest watcher unavailable; routes will not reload");
            return;
        }
    };
    let mut changes = watcher.subscribe();

    tokio::spawn(async move {
        let _watcher = watcher;
        while let Ok(change) = changes.recv().await {
            match change.kind {
                ManifestKind::Routes => {
                    if let Err(e) = app.reload_routes().await {
                        warn!(path = %change.path.display(), error = %e, "routes manifest rejected");
                    }
                }
                ManifestKind::Prerender => {
                    info!(path = %change.path.display(), "prerender manifest changed; restart to apply");
                }
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

// File: src/static_files.rs
// Purpose: Discover public and build-output files and serve them

use crate::response::{apply_headers, IMMUTABLE_CACHE_CONTROL};
use axum::body::Body;
use axum::http::{header, HeaderValue, Request};
use axum::response::{IntoResponse, Response};
use folio_router::ResponseHeaders;
use std::path::{Path, PathBuf};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// URL prefix of build assets under `<dist_dir>/static`
pub const BUILD_ASSET_PREFIX: &str = "/_folio/static";

/// A file served at an exact URL path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticFile {
    pub url: String,
    pub path: PathBuf,
    /// Build assets are fingerprinted and never change
    pub immutable: bool,
}

/// Lists public files (served at the site root) and build assets
///
/// Missing directories contribute nothing.
pub fn discover(public_dir: &Path, dist_dir: &Path) -> Vec<StaticFile> {
    let mut files = walk(public_dir, "", false);
    files.extend(walk(&dist_dir.join("static"), BUILD_ASSET_PREFIX, true));
    debug!(count = files.len(), "static files discovered");
    files
}

fn walk(root: &Path, prefix: &str, immutable: bool) -> Vec<StaticFile> {
    if !root.is_dir() {
        return Vec::new();
    }

    WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "skipping unreadable static file");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let relative = entry.path().strip_prefix(root).ok()?;
            let url = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            Some(StaticFile {
                url: format!("{}/{}", prefix, url),
                path: entry.path().to_path_buf(),
                immutable,
            })
        })
        .collect()
}

/// Serves one file, honoring conditional and range headers of the request
pub async fn serve(path: &Path, immutable: bool, request: Request<Body>, route_headers: &ResponseHeaders) -> Response {
    let mut response = match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    };

    apply_headers(&mut response, route_headers);
    if immutable {
        response
            .headers_mut()
            .insert(header::CACHE_CONTROL, HeaderValue::from_static(IMMUTABLE_CACHE_CONTROL));
    }
    response.into_response()
}

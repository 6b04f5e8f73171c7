// File: src/error.rs
// Purpose: Framework-level error type

use folio_isr::CoalesceError;
use folio_router::RouteError;
use thiserror::Error;

/// Errors raised while registering pages or serving a request
///
/// Registration errors (`Route`, `ConflictingDataStrategy`,
/// `MissingPathEnumeration`, `UnknownPage`, `InvalidPaths`) are returned from
/// [`crate::AppBuilder::init`] and the [`crate::Builder`]; they never surface at
/// request time.
#[derive(Debug, Error)]
pub enum FolioError {
    #[error(transparent)]
    Route(#[from] RouteError),

    #[error("page `{page}` declares both static data and per-request data")]
    ConflictingDataStrategy { page: String },

    #[error("dynamic page `{page}` is statically regenerated but declares no path enumeration")]
    MissingPathEnumeration { page: String },

    #[error("no page module registered for `{page}`")]
    UnknownPage { page: String },

    #[error("invalid prerender path for `{page}`: {reason}")]
    InvalidPaths { page: String, reason: String },

    #[error("render failed: {0:#}")]
    Render(anyhow::Error),

    #[error(transparent)]
    Regeneration(#[from] CoalesceError),

    #[error("upstream request failed: {0}")]
    Proxy(String),

    #[error("manifest error: {0}")]
    Manifest(String),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, FolioError>;

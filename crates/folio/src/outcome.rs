// File: src/outcome.rs
// Purpose: Result of the render step

use crate::error::FolioError;
use folio_isr::Revalidate;
use serde_json::Value;

/// How a response may be cached downstream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Shared caches may keep it for the entry's revalidation interval
    Shared(Revalidate),
    /// Per-user output: never cached
    Private,
}

/// Where a served page came from, reported in the `x-folio-cache` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Stale,
    Miss,
    /// Cache not consulted (server-rendered, preview, development)
    Bypass,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Stale => "STALE",
            CacheStatus::Miss => "MISS",
            CacheStatus::Bypass => "BYPASS",
        }
    }
}

/// A rendered page ready to be written out
#[derive(Debug, Clone, PartialEq)]
pub struct Served {
    pub markup: String,
    pub page_data: Value,
    pub policy: CachePolicy,
    pub status: CacheStatus,
    /// The skeleton placeholder rather than the page itself
    pub is_fallback: bool,
}

/// Outcome of rendering a matched page
#[derive(Debug)]
pub enum RenderOutcome {
    Served(Served),
    /// The page does not exist for this path; render the 404 page
    NotFound,
    Error(FolioError),
}

impl RenderOutcome {
    pub fn served(&self) -> Option<&Served> {
        match self {
            RenderOutcome::Served(served) => Some(served),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RenderOutcome::NotFound)
    }
}

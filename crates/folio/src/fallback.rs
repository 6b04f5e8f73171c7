// File: src/fallback.rs
// Purpose: Cache-miss handling for paths outside the prerendered set

use crate::strategy::FallbackMode;
use folio_router::cache_key;
use std::collections::HashSet;

/// Paths of one dynamic page generated ahead of time, plus its fallback mode
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrerenderedPathSet {
    paths: HashSet<String>,
    pub fallback: FallbackMode,
}

impl PrerenderedPathSet {
    pub fn new(fallback: FallbackMode) -> Self {
        Self {
            paths: HashSet::new(),
            fallback,
        }
    }

    pub fn insert(&mut self, path: &str) {
        self.paths.insert(cache_key(path));
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(&cache_key(path))
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl<'a> FromIterator<&'a str> for PrerenderedPathSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut set = Self::default();
        for path in iter {
            set.insert(path);
        }
        set
    }
}

/// What to do about a cache miss
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackDecision {
    /// Respond 404
    NotFound,
    /// Serve the page skeleton and generate in the background
    Skeleton,
    /// Generate now and respond with the result
    Block,
}

/// Decides how a cache miss is handled
///
/// Preview sessions and prerendered paths always block: a prerendered path can
/// only miss while the cache is still warming. Data requests cannot use a
/// skeleton, so they block too.
///
/// ```
/// use folio::fallback::{decide, FallbackDecision, PrerenderedPathSet};
/// use folio::FallbackMode;
///
/// let mut set = PrerenderedPathSet::new(FallbackMode::Disabled);
/// set.insert("/blog/a");
/// assert_eq!(decide(&set, "/blog/a", false, false), FallbackDecision::Block);
/// assert_eq!(decide(&set, "/blog/zzz", false, false), FallbackDecision::NotFound);
/// ```
pub fn decide(set: &PrerenderedPathSet, path: &str, preview: bool, data_request: bool) -> FallbackDecision {
    if preview || set.contains(path) {
        return FallbackDecision::Block;
    }

    match set.fallback {
        FallbackMode::Disabled => FallbackDecision::NotFound,
        FallbackMode::Skeleton if data_request => FallbackDecision::Block,
        FallbackMode::Skeleton => FallbackDecision::Skeleton,
        FallbackMode::Blocking => FallbackDecision::Block,
    }
}

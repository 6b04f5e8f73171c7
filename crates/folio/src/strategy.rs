// File: src/strategy.rs
// Purpose: Decide how a page is rendered from the capabilities it declares

use crate::error::{FolioError, Result};
use crate::page::PageModule;
use folio_isr::Revalidate;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// How a page is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStrategy {
    /// No data functions: rendered once per path and kept forever
    Static,
    /// Per-request data: rendered on every request, never cached
    ServerRendered,
    /// Static data, regenerated in the background once stale
    Regenerated { revalidate: Revalidate, dynamic: bool },
}

impl RenderStrategy {
    /// Revalidation applied to cache entries of this page
    pub fn revalidate(&self) -> Option<Revalidate> {
        match self {
            RenderStrategy::Static => Some(Revalidate::Never),
            RenderStrategy::ServerRendered => None,
            RenderStrategy::Regenerated { revalidate, .. } => Some(*revalidate),
        }
    }

    pub fn is_cached(&self) -> bool {
        !matches!(self, RenderStrategy::ServerRendered)
    }
}

/// What happens on a request for a dynamic path that was not generated ahead of time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FallbackMode {
    /// 404
    #[default]
    Disabled,
    /// Serve a placeholder now, generate in the background
    Skeleton,
    /// Generate before responding
    Blocking,
}

/// Computes a page's strategy at registration time
///
/// `dynamic` is whether the page template has parameters. Pages with static
/// data but no declared interval use `default_revalidate`.
///
/// # Errors
///
/// - [`FolioError::ConflictingDataStrategy`] when a page declares both static
///   and per-request data, or enumerates paths next to per-request data
/// - [`FolioError::MissingPathEnumeration`] when a dynamic page uses static
///   data without enumerating its paths
pub fn resolve_strategy(
    module: &PageModule,
    dynamic: bool,
    default_revalidate: Revalidate,
) -> Result<RenderStrategy> {
    let page = || module.route.clone();

    match (&module.static_data, &module.server_data) {
        (Some(_), Some(_)) => Err(FolioError::ConflictingDataStrategy { page: page() }),
        (None, Some(_)) if module.paths.is_some() => {
            Err(FolioError::ConflictingDataStrategy { page: page() })
        }
        (None, Some(_)) => Ok(RenderStrategy::ServerRendered),
        (Some(_), None) if dynamic && module.paths.is_none() => {
            Err(FolioError::MissingPathEnumeration { page: page() })
        }
        (Some(_), None) => Ok(RenderStrategy::Regenerated {
            revalidate: module.revalidate.unwrap_or(default_revalidate),
            dynamic,
        }),
        (None, None) => {
            if module.paths.is_some() {
                warn!(page = %module.route, "path enumeration without static data is ignored");
            }
            Ok(RenderStrategy::Static)
        }
    }
}

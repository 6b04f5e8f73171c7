//! # folio router
//!
//! Request routing for the folio framework:
//! - Page templates with dynamic segments (`/blog/[post]`, `/docs/[...slug]`,
//!   `/docs/[[...slug]]`) compiled into regex matchers
//! - Deterministic ordering of dynamic routes (literal segments beat
//!   parameters, parameters beat catch-alls)
//! - A staged pipeline: headers → redirects → rewrites → static files →
//!   exact pages → dynamic pages
//! - The routes manifest that fixes header/redirect/rewrite rules at build time
//!
//! Compilation happens once, at registration. Matching never fails: a request
//! either resolves to a stage outcome or falls through to [`Resolution::NotFound`].
//!
//! ## Example
//!
//! ```
//! use folio_router::{Pipeline, PipelineRequest, RedirectRule, Resolution};
//!
//! let pipeline = Pipeline::new("build-1")
//!     .with_redirect_rule(&RedirectRule::new("/old", "/new", 301)).unwrap()
//!     .with_page("/blog/[post]").unwrap();
//!
//! match pipeline.resolve(&PipelineRequest::new("/blog/hello")) {
//!     Resolution::Page(page) => assert_eq!(page.page, "/blog/[post]"),
//!     other => panic!("unexpected {:?}", other),
//! }
//! ```

use std::path::PathBuf;

// ============================================================================
// Module Declarations
// ============================================================================

pub mod data;
mod error;
pub mod manifest;
mod params;
pub mod path;
pub mod pipeline;
pub mod route;
pub mod rule;

pub use error::{Result, RouteError};
pub use manifest::RoutesManifest;
pub use params::{ParamValue, Params, Query};
pub use path::{cache_key, normalize_path};
pub use pipeline::{PageMatch, Pipeline, PipelineRequest, Resolution, ResponseHeaders};
pub use route::{RoutePattern, Segment};
pub use rule::{HeaderEntry, HeaderRule, RedirectRule, RewriteRule};

// ============================================================================
// Core Types
// ============================================================================

/// The pipeline stage a route belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    Header,
    Redirect,
    Rewrite,
    Filesystem,
    Page,
}

/// What a matching route does
#[derive(Debug, Clone, PartialEq)]
pub enum RouteAction {
    /// Add response headers and continue
    Headers(Vec<HeaderEntry>),
    /// Terminate with a 3xx response
    Redirect { destination: String, status: u16 },
    /// Continue with a substituted path, or proxy when the destination is foreign
    Rewrite { destination: String },
    /// Serve a file from disk
    File { path: PathBuf, immutable: bool },
    /// Render the page registered under this template
    Page { page: String },
}

/// A compiled route: a matcher plus the action taken on match
///
/// Created once at startup and never mutated while requests are evaluated.
#[derive(Debug, Clone)]
pub struct Route {
    pub pattern: RoutePattern,
    pub action: RouteAction,
}

impl Route {
    /// Compiles a header rule
    pub fn header(rule: &HeaderRule) -> Result<Self> {
        Ok(Self {
            pattern: RoutePattern::compile_rule(&rule.source)?,
            action: RouteAction::Headers(rule.headers.clone()),
        })
    }

    /// Compiles a redirect rule
    ///
    /// ```
    /// use folio_router::{RedirectRule, Route, RouteKind};
    ///
    /// let route = Route::redirect(&RedirectRule::new("/blog/:slug", "/articles/:slug", 301)).unwrap();
    /// assert_eq!(route.kind(), RouteKind::Redirect);
    /// assert!(route.matches("/blog/hello").is_some());
    /// ```
    pub fn redirect(rule: &RedirectRule) -> Result<Self> {
        Ok(Self {
            pattern: RoutePattern::compile_rule(&rule.source)?,
            action: RouteAction::Redirect {
                destination: rule.destination.clone(),
                status: rule.status()?,
            },
        })
    }

    /// Compiles a rewrite rule
    pub fn rewrite(rule: &RewriteRule) -> Result<Self> {
        if !rule::is_external(&rule.destination) && !rule.destination.starts_with('/') {
            return Err(RouteError::InvalidRule {
                rule: rule.source.clone(),
                reason: "destination must be an absolute path or URL".to_string(),
            });
        }
        Ok(Self {
            pattern: RoutePattern::compile_rule(&rule.source)?,
            action: RouteAction::Rewrite {
                destination: rule.destination.clone(),
            },
        })
    }

    /// Compiles a page template
    pub fn page(template: &str) -> Result<Self> {
        Ok(Self {
            pattern: RoutePattern::compile(template)?,
            action: RouteAction::Page {
                page: template.to_string(),
            },
        })
    }

    /// A static file served at an exact URL path
    pub fn file(url_path: &str, file: impl Into<PathBuf>, immutable: bool) -> Result<Self> {
        Ok(Self {
            pattern: RoutePattern::literal(url_path)?,
            action: RouteAction::File {
                path: file.into(),
                immutable,
            },
        })
    }

    pub fn kind(&self) -> RouteKind {
        match self.action {
            RouteAction::Headers(_) => RouteKind::Header,
            RouteAction::Redirect { .. } => RouteKind::Redirect,
            RouteAction::Rewrite { .. } => RouteKind::Rewrite,
            RouteAction::File { .. } => RouteKind::Filesystem,
            RouteAction::Page { .. } => RouteKind::Page,
        }
    }

    /// Matches a normalized request path
    pub fn matches(&self, path: &str) -> Option<Params> {
        self.pattern.match_path(path)
    }
}

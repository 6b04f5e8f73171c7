// folio - page routing and incremental static regeneration
// Pages declare how they get their data; folio decides how they are rendered and cached

// Framework modules
pub mod app;
pub mod builder;
pub mod config;
pub mod context;
pub mod error;
pub mod fallback;
pub mod manifest;
pub mod outcome;
pub mod page;
pub mod proxy;
pub mod render;
pub mod response;
pub mod static_files;
pub mod strategy;

// Re-export core types
pub use app::{serve, App, AppBuilder, ERROR_PAGE, NOT_FOUND_PAGE};
pub use builder::{resolve_pages, Builder, ResolvedPage};
pub use config::Config;
pub use context::{RenderContext, RenderOutput};
pub use error::{FolioError, Result};
pub use fallback::{FallbackDecision, PrerenderedPathSet};
pub use manifest::{PrerenderManifest, PRERENDER_MANIFEST};
pub use outcome::{CachePolicy, CacheStatus, RenderOutcome, Served};
pub use page::{
    DataContext, DocumentRenderer, MarkupRenderer, PageLoader, PageModule, PageRegistry, StaticPaths,
    StaticProps,
};
pub use render::Renderer;
pub use strategy::{resolve_strategy, FallbackMode, RenderStrategy};

// Re-export the routing and cache crates
pub use folio_isr;
pub use folio_router;
pub use folio_isr::Revalidate;
pub use folio_router::{ParamValue, Params, Query};

// Re-export commonly used types from dependencies
pub use axum;
pub use maud;

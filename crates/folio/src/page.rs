// File: src/page.rs
// Purpose: Page modules, the loader that resolves them and the markup renderer

use crate::context::{RenderContext, RenderOutput};
use crate::strategy::FallbackMode;
use async_trait::async_trait;
use folio_isr::Revalidate;
use folio_router::{Params, Query};
use futures::future::{BoxFuture, FutureExt};
use maud::{html, PreEscaped, DOCTYPE};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Input to a page's data functions
#[derive(Debug, Clone, Default)]
pub struct DataContext {
    pub path: String,
    pub params: Params,
    pub query: Query,
    pub preview: bool,
}

impl From<&RenderContext> for DataContext {
    fn from(ctx: &RenderContext) -> Self {
        Self {
            path: ctx.path.clone(),
            params: ctx.params.clone(),
            query: ctx.query.clone(),
            preview: ctx.preview,
        }
    }
}

/// What a static-data function returns
#[derive(Debug, Clone, PartialEq)]
pub struct StaticProps {
    pub data: Value,
    /// Overrides the page's revalidation interval for this render
    pub revalidate: Option<Revalidate>,
    /// The path has no page; respond 404 and cache nothing
    pub not_found: bool,
}

impl StaticProps {
    pub fn new(data: Value) -> Self {
        Self {
            data,
            revalidate: None,
            not_found: false,
        }
    }

    pub fn not_found() -> Self {
        Self {
            data: Value::Null,
            revalidate: None,
            not_found: true,
        }
    }

    pub fn with_revalidate(mut self, revalidate: Revalidate) -> Self {
        self.revalidate = Some(revalidate);
        self
    }
}

/// What a path-enumeration function returns
#[derive(Debug, Clone, PartialEq)]
pub struct StaticPaths {
    /// Parameter sets generated ahead of time
    pub paths: Vec<Params>,
    /// Behavior for paths outside that set
    pub fallback: FallbackMode,
}

/// Markup-producing function of a page
pub type ComponentFn = Arc<dyn Fn(&RenderContext, &Value) -> anyhow::Result<RenderOutput> + Send + Sync>;

/// Static (build-time or regeneration-time) data function
pub type StaticDataFn =
    Arc<dyn Fn(DataContext) -> BoxFuture<'static, anyhow::Result<StaticProps>> + Send + Sync>;

/// Per-request data function
pub type ServerDataFn = Arc<dyn Fn(DataContext) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

/// Path enumeration function of a dynamic page
pub type PathsFn = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<StaticPaths>> + Send + Sync>;

/// A compiled page: its component plus the data capabilities it declares
#[derive(Clone)]
pub struct PageModule {
    pub route: String,
    pub component: ComponentFn,
    pub static_data: Option<StaticDataFn>,
    pub server_data: Option<ServerDataFn>,
    pub paths: Option<PathsFn>,
    /// Page-level revalidation interval for static data
    pub revalidate: Option<Revalidate>,
}

impl std::fmt::Debug for PageModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageModule")
            .field("route", &self.route)
            .field("static_data", &self.static_data.is_some())
            .field("server_data", &self.server_data.is_some())
            .field("paths", &self.paths.is_some())
            .field("revalidate", &self.revalidate)
            .finish()
    }
}

impl PageModule {
    pub fn new<F>(route: impl Into<String>, component: F) -> Self
    where
        F: Fn(&RenderContext, &Value) -> anyhow::Result<RenderOutput> + Send + Sync + 'static,
    {
        Self {
            route: route.into(),
            component: Arc::new(component),
            static_data: None,
            server_data: None,
            paths: None,
            revalidate: None,
        }
    }

    pub fn with_static_data<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(DataContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<StaticProps>> + Send + 'static,
    {
        let data: StaticDataFn = Arc::new(move |ctx: DataContext| f(ctx).boxed());
        self.static_data = Some(data);
        self
    }

    pub fn with_server_data<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(DataContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        let data: ServerDataFn = Arc::new(move |ctx: DataContext| f(ctx).boxed());
        self.server_data = Some(data);
        self
    }

    pub fn with_paths<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<StaticPaths>> + Send + 'static,
    {
        let paths: PathsFn = Arc::new(move || f().boxed());
        self.paths = Some(paths);
        self
    }

    pub fn with_revalidate(mut self, revalidate: Revalidate) -> Self {
        self.revalidate = Some(revalidate);
        self
    }
}

/// Resolves page templates to compiled page modules
pub trait PageLoader: Send + Sync {
    /// The module registered for a page template
    fn load(&self, route: &str) -> Option<Arc<PageModule>>;

    /// Every registered page template
    fn routes(&self) -> Vec<String>;
}

/// A [`PageLoader`] over modules registered in code
#[derive(Clone, Default)]
pub struct PageRegistry {
    pages: HashMap<String, Arc<PageModule>>,
}

impl PageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a module under its own route, replacing any previous one
    pub fn register(&mut self, module: PageModule) {
        self.pages.insert(module.route.clone(), Arc::new(module));
    }

    pub fn with_page(mut self, module: PageModule) -> Self {
        self.register(module);
        self
    }

    pub fn count(&self) -> usize {
        self.pages.len()
    }
}

impl PageLoader for PageRegistry {
    fn load(&self, route: &str) -> Option<Arc<PageModule>> {
        self.pages.get(route).cloned()
    }

    fn routes(&self) -> Vec<String> {
        let mut routes: Vec<String> = self.pages.keys().cloned().collect();
        routes.sort();
        routes
    }
}

/// Turns a page module and its data into a full HTML document
#[async_trait]
pub trait MarkupRenderer: Send + Sync {
    async fn render(&self, page: &PageModule, data: &Value, ctx: &RenderContext) -> anyhow::Result<String>;
}

/// Id of the script element carrying serialized page data
pub const DATA_ELEMENT_ID: &str = "__FOLIO_DATA__";

/// Default renderer: runs the component and wraps it in a maud document
///
/// The page data is embedded as JSON so the client can hydrate without a
/// second request.
#[derive(Debug, Clone, Default)]
pub struct DocumentRenderer;

#[async_trait]
impl MarkupRenderer for DocumentRenderer {
    async fn render(&self, page: &PageModule, data: &Value, ctx: &RenderContext) -> anyhow::Result<String> {
        let output = (page.component)(ctx, data)?;
        let payload = serde_json::json!({
            "page": ctx.page,
            "buildId": ctx.build_id,
            "isFallback": ctx.is_fallback,
            "props": data,
        });
        // `</` would close the script element early
        let payload = payload.to_string().replace("</", "<\\/");

        let document = html! {
            (DOCTYPE)
            html lang="en" {
                head {
                    meta charset="UTF-8";
                    meta name="viewport" content="width=device-width, initial-scale=1";
                    @for tag in &output.head {
                        (PreEscaped(tag))
                    }
                }
                body {
                    div id="__folio" { (PreEscaped(&output.body)) }
                    script id=(DATA_ELEMENT_ID) type="application/json" { (PreEscaped(payload)) }
                }
            }
        };

        Ok(document.into_string())
    }
}

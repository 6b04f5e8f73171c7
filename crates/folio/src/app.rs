// File: src/app.rs
// Purpose: The application: routing pipeline, renderer and HTTP entry point

use crate::builder::Builder;
use crate::config::Config;
use crate::error::{FolioError, Result};
use crate::manifest::{PrerenderManifest, PRERENDER_MANIFEST};
use crate::outcome::RenderOutcome;
use crate::page::{DocumentRenderer, MarkupRenderer, PageLoader};
use crate::proxy::Proxy;
use crate::render::Renderer;
use crate::response::{
    bad_gateway_page, error_response, not_found_page, page_response, redirect_response, server_error_page,
};
use crate::static_files;
use axum::body::to_bytes;
use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::Router;
use folio_isr::RegenerationCache;
use folio_router::manifest::ROUTES_MANIFEST;
use folio_router::rule::parse_query;
use folio_router::{Pipeline, PipelineRequest, Resolution, ResponseHeaders, RoutesManifest};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Page rendered for unmatched paths when registered
pub const NOT_FOUND_PAGE: &str = "/404";

/// Page rendered for failed renders when registered
pub const ERROR_PAGE: &str = "/_error";

/// Bodies larger than this are not forwarded to proxied rewrites
const MAX_PROXY_BODY: usize = 10 * 1024 * 1024;

/// Configures and initializes an [`App`]
pub struct AppBuilder {
    config: Config,
    loader: Arc<dyn PageLoader>,
    markup: Arc<dyn MarkupRenderer>,
    routes: Option<RoutesManifest>,
}

impl AppBuilder {
    /// Renders pages with this renderer instead of [`DocumentRenderer`]
    pub fn with_markup_renderer(mut self, markup: Arc<dyn MarkupRenderer>) -> Self {
        self.markup = markup;
        self
    }

    /// Uses these rules instead of the routes manifest in `dist_dir`
    pub fn with_routes(mut self, routes: RoutesManifest) -> Self {
        self.routes = Some(routes);
        self
    }

    /// Validates every page, loads or builds the manifests and assembles the pipeline
    ///
    /// Registration errors (malformed templates, conflicting data functions,
    /// missing path enumeration) are returned here, before anything is served.
    pub async fn init(self) -> Result<App> {
        let config = self.config;
        let dist_dir = config.build.dist_dir.clone();
        let build_id = config.build.build_id.clone();

        let isr = config
            .isr
            .to_runtime_config()
            .map_err(|e| FolioError::Config(format!("{:#}", e)))?;
        let cache = RegenerationCache::init(isr)
            .await
            .map_err(|e| FolioError::Config(format!("{:#}", e)))?;

        let routes = match self.routes {
            Some(routes) => routes,
            None if dist_dir.join(ROUTES_MANIFEST).exists() => RoutesManifest::load(&dist_dir)?,
            None => RoutesManifest::default(),
        };

        let prerender = if !config.server.dev && dist_dir.join(PRERENDER_MANIFEST).exists() {
            PrerenderManifest::load(&dist_dir)?
        } else {
            info!("no prerender manifest; building in process");
            Builder::new(Arc::clone(&self.loader), build_id.clone())
                .with_workers(config.build.workers)
                .with_default_revalidate(cache.default_revalidate())
                .build()
                .await?
        };

        let mut pipeline = Pipeline::new(build_id.clone()).with_routes_manifest(&routes)?;
        for file in static_files::discover(&config.build.public_dir, &dist_dir) {
            pipeline = pipeline.with_static_file(&file.url, file.path, file.immutable)?;
        }
        for page in self.loader.routes() {
            if page != NOT_FOUND_PAGE && page != ERROR_PAGE {
                pipeline = pipeline.with_page(&page)?;
            }
        }

        let renderer = Renderer::new(self.loader.as_ref(), self.markup, cache.clone(), &prerender, build_id)
            .await?
            .with_dev(config.server.dev);

        let proxy = Proxy::new(Duration::from_secs(30))?;

        info!(
            build_id = %config.build.build_id,
            dev = config.server.dev,
            prerendered = prerender.routes.len(),
            "app initialized"
        );

        Ok(App {
            inner: Arc::new(AppInner {
                config,
                pipeline: RwLock::new(pipeline),
                renderer,
                cache,
                proxy,
                prerender,
            }),
        })
    }
}

struct AppInner {
    config: Config,
    pipeline: RwLock<Pipeline>,
    renderer: Renderer,
    cache: RegenerationCache,
    proxy: Proxy,
    prerender: PrerenderManifest,
}

/// A folio application
///
/// Cloning is cheap; clones share the pipeline and the regeneration cache.
#[derive(Clone)]
pub struct App {
    inner: Arc<AppInner>,
}

impl App {
    pub fn builder(config: Config, loader: Arc<dyn PageLoader>) -> AppBuilder {
        AppBuilder {
            config,
            loader,
            markup: Arc::new(DocumentRenderer),
            routes: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn cache(&self) -> &RegenerationCache {
        &self.inner.cache
    }

    pub fn prerender_manifest(&self) -> &PrerenderManifest {
        &self.inner.prerender
    }

    /// Axum router sending every request through [`App::handle`]
    pub fn router(&self) -> Router {
        Router::new()
            .fallback(handle_request)
            .with_state(self.clone())
            .layer(TraceLayer::new_for_http())
    }

    /// Runs one request through the pipeline and renders the result
    pub async fn handle(&self, request: Request) -> Response {
        let preview = self.is_preview(&request);
        let pipeline_request = PipelineRequest {
            path: request.uri().path().to_string(),
            query: parse_query(request.uri().query().unwrap_or_default()),
            host: request
                .headers()
                .get(header::HOST)
                .and_then(|h| h.to_str().ok())
                .map(str::to_string),
        };

        let resolution = self.inner.pipeline.read().await.resolve(&pipeline_request);

        match resolution {
            Resolution::Redirect {
                status,
                location,
                headers,
            } => redirect_response(status, &location, &headers),
            Resolution::Proxy { url, headers } => self.proxy(&url, request, &headers).await,
            Resolution::File {
                path,
                immutable,
                headers,
            } => static_files::serve(&path, immutable, request, &headers).await,
            Resolution::Page(page) => match self.inner.renderer.render(&page, preview).await {
                RenderOutcome::Served(served) => {
                    page_response(&served, page.data_request, &page.headers, self.inner.config.server.dev)
                }
                RenderOutcome::NotFound => self.not_found(page.data_request, &page.headers).await,
                RenderOutcome::Error(e) => {
                    error!(path = %page.path, page = %page.page, error = %e, "render failed");
                    self.server_error(page.data_request, &page.headers).await
                }
            },
            Resolution::NotFound { data_request, headers } => self.not_found(data_request, &headers).await,
        }
    }

    /// Re-reads the routes manifest from `dist_dir` and swaps the rule stages
    ///
    /// A manifest that fails to load or compile leaves the current rules in place.
    pub async fn reload_routes(&self) -> Result<()> {
        let manifest = RoutesManifest::load(&self.inner.config.build.dist_dir)?;
        self.inner.pipeline.write().await.replace_rules(&manifest)?;
        info!(
            headers = manifest.headers.len(),
            redirects = manifest.redirects.len(),
            rewrites = manifest.rewrites.len(),
            "routes reloaded"
        );
        Ok(())
    }

    /// Renders every prerendered path into the cache
    pub async fn warm(&self) -> usize {
        self.inner.renderer.warm(&self.inner.prerender).await
    }

    /// Regenerates the page at `path` now
    pub async fn revalidate(&self, path: &str) -> Result<()> {
        let resolution = self.inner.pipeline.read().await.resolve(&PipelineRequest::new(path));
        match resolution {
            Resolution::Page(page) => self.inner.renderer.revalidate(&page).await,
            _ => Err(FolioError::UnknownPage { page: path.to_string() }),
        }
    }

    /// Stops background regeneration and flushes pending cache writes
    pub async fn teardown(&self) {
        self.inner.cache.teardown().await;
    }

    fn is_preview(&self, request: &Request) -> bool {
        let config = &self.inner.config;
        if config.preview.secret.is_none() {
            return false;
        }

        request
            .headers()
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|cookies| cookies.split(';'))
            .filter_map(|cookie| cookie.trim().split_once('='))
            .any(|(name, value)| name == config.preview.bypass_cookie && config.is_preview_token(value))
    }

    async fn proxy(&self, url: &str, request: Request, headers: &ResponseHeaders) -> Response {
        let (parts, body) = request.into_parts();
        let body = match to_bytes(body, MAX_PROXY_BODY).await {
            Ok(body) => body,
            Err(e) => {
                warn!(url = %url, error = %e, "request body not forwarded");
                return error_response(StatusCode::PAYLOAD_TOO_LARGE, String::new(), false, headers);
            }
        };

        match self.inner.proxy.forward(url, parts.method, &parts.headers, body).await {
            Ok(mut response) => {
                crate::response::apply_headers(&mut response, headers);
                response
            }
            Err(e) => {
                warn!(url = %url, error = %e, "proxy failed");
                error_response(StatusCode::BAD_GATEWAY, bad_gateway_page().into_string(), false, headers)
            }
        }
    }

    async fn not_found(&self, data_request: bool, headers: &ResponseHeaders) -> Response {
        let markup = match self.inner.renderer.render_special(NOT_FOUND_PAGE).await {
            Some(served) => served.markup,
            None => not_found_page().into_string(),
        };
        error_response(StatusCode::NOT_FOUND, markup, data_request, headers)
    }

    async fn server_error(&self, data_request: bool, headers: &ResponseHeaders) -> Response {
        let markup = match self.inner.renderer.render_special(ERROR_PAGE).await {
            Some(served) => served.markup,
            None => server_error_page().into_string(),
        };
        error_response(StatusCode::INTERNAL_SERVER_ERROR, markup, data_request, headers)
    }
}

async fn handle_request(State(app): State<App>, request: Request) -> Response {
    app.handle(request).await
}

/// Serves an app until `shutdown` resolves, then drains background work
pub async fn serve<F>(app: App, shutdown: F) -> anyhow::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let address = app.config().address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(address = %address, "listening");

    axum::serve(listener, app.router())
        .with_graceful_shutdown(shutdown)
        .await?;

    app.teardown().await;
    Ok(())
}

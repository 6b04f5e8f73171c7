// File: src/render.rs
// Purpose: Render step: cache lookup, stale-while-revalidate, fallback handling

use crate::builder::{resolve_pages, ResolvedPage};
use crate::context::RenderContext;
use crate::error::{FolioError, Result};
use crate::fallback::{decide, FallbackDecision, PrerenderedPathSet};
use crate::manifest::PrerenderManifest;
use crate::outcome::{CachePolicy, CacheStatus, RenderOutcome, Served};
use crate::page::{DataContext, MarkupRenderer, PageLoader, PageModule};
use crate::strategy::{FallbackMode, RenderStrategy};
use folio_isr::{CacheEntry, CoalesceError, Lookup, RegenerationCache, Revalidate};
use folio_router::{cache_key, PageMatch, Params, Query};
use futures::future::{join_all, BoxFuture, FutureExt};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Raised inside a regeneration when static data reports the path as missing
///
/// Only ever travels inside an `anyhow::Error` and is recognized by downcast.
#[derive(Debug, Error)]
#[error("page data reported not found")]
struct PageNotFound;

type Generate = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<CacheEntry>> + Send>;

struct RegisteredPage {
    module: Arc<PageModule>,
    strategy: RenderStrategy,
    /// Dynamic regenerated pages only
    prerendered: Option<PrerenderedPathSet>,
    skeleton: Option<String>,
}

/// Renders matched pages according to their strategy
pub struct Renderer {
    markup: Arc<dyn MarkupRenderer>,
    cache: RegenerationCache,
    pages: HashMap<String, RegisteredPage>,
    build_id: String,
    dev: bool,
}

impl Renderer {
    /// Resolves every page of `loader` and prepares skeletons
    ///
    /// Dynamic regenerated pages take their prerendered paths and fallback mode
    /// from `manifest`.
    pub async fn new(
        loader: &dyn PageLoader,
        markup: Arc<dyn MarkupRenderer>,
        cache: RegenerationCache,
        manifest: &PrerenderManifest,
        build_id: impl Into<String>,
    ) -> Result<Self> {
        let resolved = resolve_pages(loader, cache.default_revalidate())?;
        let mut sets = manifest.path_sets();

        let mut renderer = Self {
            markup,
            cache,
            pages: HashMap::new(),
            build_id: build_id.into(),
            dev: false,
        };

        for ResolvedPage { module, pattern, strategy } in resolved {
            let template = pattern.source().to_string();
            let prerendered = match strategy {
                RenderStrategy::Regenerated { dynamic: true, .. } => {
                    Some(sets.remove(&template).unwrap_or_else(|| {
                        warn!(page = %template, "page missing from prerender manifest; rendering on demand");
                        PrerenderedPathSet::new(FallbackMode::Blocking)
                    }))
                }
                _ => None,
            };

            let skeleton = match &prerendered {
                Some(set) if set.fallback == FallbackMode::Skeleton => {
                    Some(renderer.render_skeleton(&module).await?)
                }
                _ => None,
            };

            renderer.pages.insert(
                template,
                RegisteredPage {
                    module,
                    strategy,
                    prerendered,
                    skeleton,
                },
            );
        }

        info!(pages = renderer.pages.len(), "renderer ready");
        Ok(renderer)
    }

    /// Development mode: cache reads are skipped and every request renders
    pub fn with_dev(mut self, dev: bool) -> Self {
        self.dev = dev;
        self
    }

    pub fn has_page(&self, page: &str) -> bool {
        self.pages.contains_key(page)
    }

    pub fn strategy(&self, page: &str) -> Option<RenderStrategy> {
        self.pages.get(page).map(|p| p.strategy)
    }

    pub fn cache(&self) -> &RegenerationCache {
        &self.cache
    }

    /// Renders a page matched by the router
    pub async fn render(&self, page: &PageMatch, preview: bool) -> RenderOutcome {
        let Some(registered) = self.pages.get(&page.page) else {
            return RenderOutcome::Error(FolioError::UnknownPage {
                page: page.page.clone(),
            });
        };

        let mut ctx = RenderContext::from_match(page, &self.build_id)
            .with_preview(preview)
            .with_dev(self.dev);
        if registered.strategy.is_cached() && !preview {
            // Cached output is shared by every request for the path
            ctx = ctx.with_query(page.route_query.clone());
        }

        match registered.strategy {
            RenderStrategy::ServerRendered => self.render_server(registered, ctx).await,
            _ if preview => self.render_preview(registered, ctx).await,
            _ if self.dev => {
                let key = cache_key(&ctx.path);
                let generate = generator(registered, Arc::clone(&self.markup), ctx, key.clone());
                served_or_error(self.cache.regenerate(&key, generate).await, CacheStatus::Bypass)
            }
            _ => self.render_cached(registered, ctx, page.data_request).await,
        }
    }

    /// Renders a reserved page (`/404`, `/_error`) registered without parameters
    pub async fn render_special(&self, page: &str) -> Option<Served> {
        if !self.has_page(page) {
            return None;
        }

        let matched = PageMatch {
            page: page.to_string(),
            path: page.to_string(),
            original_path: page.to_string(),
            params: Params::new(),
            query: Query::new(),
            route_query: Query::new(),
            headers: Vec::new(),
            data_request: false,
            rewritten: false,
        };

        match self.render(&matched, false).await {
            RenderOutcome::Served(served) => Some(served),
            RenderOutcome::NotFound => None,
            RenderOutcome::Error(e) => {
                error!(page = %page, error = %e, "reserved page failed to render");
                None
            }
        }
    }

    /// Regenerates a path now, replacing any cached entry
    pub async fn revalidate(&self, page: &PageMatch) -> Result<()> {
        let registered = self
            .pages
            .get(&page.page)
            .ok_or_else(|| FolioError::UnknownPage { page: page.page.clone() })?;

        if !registered.strategy.is_cached() {
            return Ok(());
        }

        let ctx = RenderContext::from_match(page, &self.build_id).with_query(page.route_query.clone());
        let key = cache_key(&ctx.path);
        let generate = generator(registered, Arc::clone(&self.markup), ctx, key.clone());

        match self.cache.regenerate(&key, generate).await {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => {
                self.cache.invalidate(&key).await.map_err(FolioError::Render)?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Renders every prerendered path into the cache
    ///
    /// Returns how many entries were written. Failures are logged and skipped.
    pub async fn warm(&self, manifest: &PrerenderManifest) -> usize {
        let jobs = manifest.routes.iter().filter_map(|(path, route)| {
            let template = route.src_route.clone().unwrap_or_else(|| path.clone());
            let registered = self.pages.get(&template)?;
            let params = folio_router::RoutePattern::compile(&template)
                .ok()
                .and_then(|p| p.match_path(path))
                .unwrap_or_default();
            let ctx = RenderContext::new(template, path.clone())
                .with_params(params)
                .with_build_id(self.build_id.clone());
            let key = cache_key(path);
            let generate = generator(registered, Arc::clone(&self.markup), ctx, key.clone());
            Some(async move {
                match self.cache.regenerate(&key, generate).await {
                    Ok(_) => true,
                    Err(e) => {
                        warn!(key = %key, error = %e, "warming failed");
                        false
                    }
                }
            })
        });

        let warmed = join_all(jobs).await.into_iter().filter(|ok| *ok).count();
        info!(entries = warmed, "cache warmed");
        warmed
    }

    async fn render_server(&self, registered: &RegisteredPage, ctx: RenderContext) -> RenderOutcome {
        let Some(server_data) = &registered.module.server_data else {
            return RenderOutcome::Error(FolioError::UnknownPage { page: ctx.page });
        };

        let data = match server_data(DataContext::from(&ctx)).await {
            Ok(data) => data,
            Err(e) => return RenderOutcome::Error(FolioError::Render(e)),
        };

        match self.markup.render(&registered.module, &data, &ctx).await {
            Ok(markup) => RenderOutcome::Served(Served {
                markup,
                page_data: data,
                policy: CachePolicy::Private,
                status: CacheStatus::Bypass,
                is_fallback: false,
            }),
            Err(e) => RenderOutcome::Error(FolioError::Render(e)),
        }
    }

    async fn render_preview(&self, registered: &RegisteredPage, ctx: RenderContext) -> RenderOutcome {
        let key = cache_key(&ctx.path);
        debug!(key = %key, "preview render");
        let generate = generator(registered, Arc::clone(&self.markup), ctx, key.clone());

        match self.cache.compute_preview(&key, generate).await {
            Ok(entry) => RenderOutcome::Served(Served {
                markup: entry.markup,
                page_data: entry.page_data,
                policy: CachePolicy::Private,
                status: CacheStatus::Bypass,
                is_fallback: false,
            }),
            Err(e) if is_not_found(&e) => RenderOutcome::NotFound,
            Err(e) => RenderOutcome::Error(e.into()),
        }
    }

    async fn render_cached(&self, registered: &RegisteredPage, ctx: RenderContext, data_request: bool) -> RenderOutcome {
        let key = cache_key(&ctx.path);

        match self.cache.lookup(&key).await {
            Lookup::Fresh(entry) => served(entry, CacheStatus::Hit),
            Lookup::Stale(entry) => {
                let generate = generator(registered, Arc::clone(&self.markup), ctx, key.clone());
                if self.cache.revalidate_in_background(&key, generate) {
                    debug!(key = %key, "stale entry served; regeneration scheduled");
                }
                served(entry, CacheStatus::Stale)
            }
            Lookup::Miss => {
                let decision = match &registered.prerendered {
                    Some(set) => decide(set, &ctx.path, false, data_request),
                    None => FallbackDecision::Block,
                };

                match decision {
                    FallbackDecision::NotFound => {
                        debug!(key = %key, "path not prerendered and fallback disabled");
                        RenderOutcome::NotFound
                    }
                    FallbackDecision::Skeleton => {
                        let skeleton = registered.skeleton.clone().unwrap_or_default();
                        let generate = generator(registered, Arc::clone(&self.markup), ctx, key.clone());
                        self.cache.revalidate_in_background(&key, generate);
                        debug!(key = %key, "serving skeleton");
                        RenderOutcome::Served(Served {
                            markup: skeleton,
                            page_data: Value::Null,
                            policy: CachePolicy::Private,
                            status: CacheStatus::Miss,
                            is_fallback: true,
                        })
                    }
                    FallbackDecision::Block => {
                        let generate = generator(registered, Arc::clone(&self.markup), ctx, key.clone());
                        served_or_error(self.cache.regenerate(&key, generate).await, CacheStatus::Miss)
                    }
                }
            }
        }
    }

    async fn render_skeleton(&self, module: &PageModule) -> Result<String> {
        let ctx = RenderContext::new(module.route.clone(), module.route.clone())
            .with_build_id(self.build_id.clone())
            .with_fallback(true);
        self.markup
            .render(module, &Value::Null, &ctx)
            .await
            .map_err(FolioError::Render)
    }
}

/// Builds the regeneration closure for one path
///
/// Runs static data (if any), then the markup renderer. A revalidate returned
/// by the static data overrides the page default for this entry.
fn generator(registered: &RegisteredPage, markup: Arc<dyn MarkupRenderer>, ctx: RenderContext, key: String) -> Generate {
    let module = Arc::clone(&registered.module);
    let default = registered.strategy.revalidate().unwrap_or(Revalidate::Never);

    Box::new(move || {
        async move {
            let (data, revalidate) = match &module.static_data {
                Some(static_data) => {
                    let props = static_data(DataContext::from(&ctx)).await?;
                    if props.not_found {
                        return Err(PageNotFound.into());
                    }
                    (props.data, props.revalidate.unwrap_or(default))
                }
                None => (Value::Object(Default::default()), default),
            };

            let html = markup.render(&module, &data, &ctx).await?;
            Ok::<_, anyhow::Error>(CacheEntry::new(key, html, data, revalidate))
        }
        .boxed()
    })
}

fn is_not_found(err: &CoalesceError) -> bool {
    matches!(err, CoalesceError::Failed(e) if e.downcast_ref::<PageNotFound>().is_some())
}

fn served(entry: CacheEntry, status: CacheStatus) -> RenderOutcome {
    RenderOutcome::Served(Served {
        markup: entry.markup,
        page_data: entry.page_data,
        policy: CachePolicy::Shared(entry.revalidate),
        status,
        is_fallback: false,
    })
}

fn served_or_error(result: std::result::Result<CacheEntry, CoalesceError>, status: CacheStatus) -> RenderOutcome {
    match result {
        Ok(entry) => served(entry, status),
        Err(e) if is_not_found(&e) => RenderOutcome::NotFound,
        Err(e) => RenderOutcome::Error(e.into()),
    }
}

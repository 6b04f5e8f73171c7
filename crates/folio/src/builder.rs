// File: src/builder.rs
// Purpose: Build step: resolve page strategies, enumerate dynamic paths, write manifests

use crate::error::{FolioError, Result};
use crate::manifest::{DynamicPrerenderRoute, PrerenderManifest, PrerenderRoute};
use crate::page::{PageLoader, PageModule};
use crate::strategy::{resolve_strategy, FallbackMode, RenderStrategy};
use folio_isr::Revalidate;
use folio_router::data::{data_route, data_route_regex};
use folio_router::{cache_key, RoutePattern, RoutesManifest};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// A registered page with its compiled template and render strategy
#[derive(Debug, Clone)]
pub struct ResolvedPage {
    pub module: Arc<PageModule>,
    pub pattern: RoutePattern,
    pub strategy: RenderStrategy,
}

/// Loads and validates every page the loader knows about
///
/// Fails on the first page that cannot be compiled or whose data functions
/// conflict, so nothing is served with a broken page set.
pub fn resolve_pages(loader: &dyn PageLoader, default_revalidate: Revalidate) -> Result<Vec<ResolvedPage>> {
    loader
        .routes()
        .into_iter()
        .map(|route| {
            let module = loader
                .load(&route)
                .ok_or_else(|| FolioError::UnknownPage { page: route.clone() })?;
            let pattern = RoutePattern::compile(&route)?;
            let strategy = resolve_strategy(&module, pattern.is_dynamic(), default_revalidate)?;
            debug!(page = %route, strategy = ?strategy, "page resolved");
            Ok(ResolvedPage {
                module,
                pattern,
                strategy,
            })
        })
        .collect()
}

/// Produces the prerender manifest for a page set
///
/// Path enumeration of dynamic pages runs on a pool of `workers` concurrent
/// tasks; everything else is synchronous.
pub struct Builder {
    loader: Arc<dyn PageLoader>,
    build_id: String,
    workers: usize,
    default_revalidate: Revalidate,
    routes: RoutesManifest,
}

impl Builder {
    pub fn new(loader: Arc<dyn PageLoader>, build_id: impl Into<String>) -> Self {
        Self {
            loader,
            build_id: build_id.into(),
            workers: 4,
            default_revalidate: Revalidate::After(60),
            routes: RoutesManifest::default(),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_default_revalidate(mut self, revalidate: Revalidate) -> Self {
        self.default_revalidate = revalidate;
        self
    }

    /// Header, redirect and rewrite rules written next to the prerender manifest
    pub fn with_routes_manifest(mut self, routes: RoutesManifest) -> Self {
        self.routes = routes;
        self
    }

    /// Computes the prerender manifest without touching disk
    pub async fn build(&self) -> Result<PrerenderManifest> {
        let pages = resolve_pages(self.loader.as_ref(), self.default_revalidate)?;
        let mut manifest = PrerenderManifest::default();
        let mut dynamic = Vec::new();

        for page in pages {
            match page.strategy {
                RenderStrategy::ServerRendered => {}
                RenderStrategy::Static if page.pattern.is_dynamic() => {}
                RenderStrategy::Regenerated { dynamic: true, .. } => dynamic.push(page),
                RenderStrategy::Static | RenderStrategy::Regenerated { .. } => {
                    let path = cache_key(page.pattern.source());
                    manifest.routes.insert(
                        path.clone(),
                        PrerenderRoute {
                            initial_revalidate_seconds: page.strategy.revalidate().unwrap_or(Revalidate::Never),
                            src_route: None,
                            data_route: data_route(&self.build_id, &path),
                        },
                    );
                }
            }
        }

        let enumerated: Vec<(ResolvedPage, Vec<String>, FallbackMode)> = stream::iter(dynamic)
            .map(|page| self.enumerate(page))
            .buffer_unordered(self.workers)
            .try_collect()
            .await?;

        for (page, paths, fallback) in enumerated {
            let template = page.pattern.source().to_string();
            let revalidate = page.strategy.revalidate().unwrap_or(Revalidate::Never);

            for path in paths {
                let key = cache_key(&path);
                manifest.routes.insert(
                    key.clone(),
                    PrerenderRoute {
                        initial_revalidate_seconds: revalidate,
                        src_route: Some(template.clone()),
                        data_route: data_route(&self.build_id, &key),
                    },
                );
            }

            manifest.dynamic_routes.insert(
                template.clone(),
                DynamicPrerenderRoute {
                    fallback,
                    route_regex: page.pattern.regex_source().to_string(),
                    data_route: data_route(&self.build_id, &template),
                    data_route_regex: data_route_regex(&page.pattern, &self.build_id),
                },
            );
        }

        info!(
            build_id = %self.build_id,
            routes = manifest.routes.len(),
            dynamic = manifest.dynamic_routes.len(),
            "build complete"
        );
        Ok(manifest)
    }

    /// Builds and writes both manifests into `dir`
    pub async fn build_to(&self, dir: &Path) -> Result<PrerenderManifest> {
        let manifest = self.build().await?;
        manifest.save(dir)?;
        self.routes.save(dir)?;
        info!(dir = %dir.display(), "manifests written");
        Ok(manifest)
    }

    async fn enumerate(&self, page: ResolvedPage) -> Result<(ResolvedPage, Vec<String>, FallbackMode)> {
        let template = page.pattern.source().to_string();
        let paths_fn = page
            .module
            .paths
            .clone()
            .ok_or_else(|| FolioError::MissingPathEnumeration { page: template.clone() })?;

        let declared = paths_fn().await.map_err(|e| FolioError::InvalidPaths {
            page: template.clone(),
            reason: format!("{:#}", e),
        })?;

        let paths = declared
            .paths
            .iter()
            .map(|params| {
                page.pattern
                    .interpolate(params)
                    .ok_or_else(|| FolioError::InvalidPaths {
                        page: template.clone(),
                        reason: format!("parameters {:?} do not fit the template", params),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(page = %template, paths = paths.len(), fallback = ?declared.fallback, "paths enumerated");
        Ok((page, paths, declared.fallback))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{RenderContext, RenderOutput};
    use crate::page::{PageRegistry, StaticPaths, StaticProps};
    use folio_router::{ParamValue, Params};
    use serde_json::{json, Value};
    use tempfile::TempDir;

    fn blank(route: &str) -> PageModule {
        PageModule::new(route, |_: &RenderContext, _: &Value| Ok(RenderOutput::new("")))
    }

    fn post(slug: &str) -> Params {
        let mut params = Params::new();
        params.insert("post".into(), ParamValue::from(slug));
        params
    }

    fn registry() -> PageRegistry {
        PageRegistry::new()
            .with_page(blank("/about"))
            .with_page(
                blank("/news")
                    .with_static_data(|_| async { Ok(StaticProps::new(json!({}))) })
                    .with_revalidate(Revalidate::After(30)),
            )
            .with_page(blank("/dash").with_server_data(|_| async { Ok(json!({})) }))
            .with_page(
                blank("/blog/[post]")
                    .with_static_data(|_| async { Ok(StaticProps::new(json!({}))) })
                    .with_paths(|| async {
                        Ok(StaticPaths {
                            paths: vec![post("a"), post("b")],
                            fallback: FallbackMode::Skeleton,
                        })
                    }),
            )
    }

    #[tokio::test]
    async fn test_build_manifest() {
        let manifest = Builder::new(Arc::new(registry()), "b1").with_workers(2).build().await.unwrap();

        let routes: Vec<&str> = manifest.routes.keys().map(String::as_str).collect();
        assert_eq!(routes, vec!["/about", "/blog/a", "/blog/b", "/news"]);
        assert_eq!(manifest.routes["/about"].initial_revalidate_seconds, Revalidate::Never);
        assert_eq!(manifest.routes["/news"].initial_revalidate_seconds, Revalidate::After(30));
        assert_eq!(manifest.routes["/blog/a"].initial_revalidate_seconds, Revalidate::After(60));
        assert_eq!(manifest.routes["/blog/a"].src_route.as_deref(), Some("/blog/[post]"));
        assert_eq!(manifest.routes["/blog/a"].data_route, "/_internal/data/b1/blog/a.json");

        let blog = &manifest.dynamic_routes["/blog/[post]"];
        assert_eq!(blog.fallback, FallbackMode::Skeleton);
        assert_eq!(blog.route_regex, "^/blog/([^/]+?)(?:/)?$");
    }

    #[tokio::test]
    async fn test_params_that_do_not_fit() {
        let registry = PageRegistry::new().with_page(
            blank("/blog/[post]")
                .with_static_data(|_| async { Ok(StaticProps::new(json!({}))) })
                .with_paths(|| async {
                    Ok(StaticPaths {
                        paths: vec![Params::new()],
                        fallback: FallbackMode::Disabled,
                    })
                }),
        );

        let err = Builder::new(Arc::new(registry), "b1").build().await.unwrap_err();
        assert!(matches!(err, FolioError::InvalidPaths { ref page, .. } if page == "/blog/[post]"));
    }

    #[tokio::test]
    async fn test_failing_enumeration() {
        let registry = PageRegistry::new().with_page(
            blank("/blog/[post]")
                .with_static_data(|_| async { Ok(StaticProps::new(json!({}))) })
                .with_paths(|| async { Err(anyhow::anyhow!("cms offline")) }),
        );

        let err = Builder::new(Arc::new(registry), "b1").build().await.unwrap_err();
        assert!(matches!(err, FolioError::InvalidPaths { ref reason, .. } if reason.contains("cms offline")));
    }

    #[tokio::test]
    async fn test_conflicting_page_fails_build() {
        let registry = PageRegistry::new().with_page(
            blank("/x")
                .with_static_data(|_| async { Ok(StaticProps::new(json!({}))) })
                .with_server_data(|_| async { Ok(json!({})) }),
        );

        let err = Builder::new(Arc::new(registry), "b1").build().await.unwrap_err();
        assert!(matches!(err, FolioError::ConflictingDataStrategy { .. }));
    }

    #[tokio::test]
    async fn test_build_to_writes_both_manifests() {
        let dir = TempDir::new().unwrap();
        let routes = RoutesManifest::default().with_redirect(folio_router::RedirectRule::new("/old", "/new", 301));

        Builder::new(Arc::new(registry()), "b1")
            .with_routes_manifest(routes)
            .build_to(dir.path())
            .await
            .unwrap();

        let prerender = PrerenderManifest::load(dir.path()).unwrap();
        assert_eq!(prerender.routes.len(), 4);
        let routes = RoutesManifest::load(dir.path()).unwrap();
        assert_eq!(routes.redirects[0].regex.as_deref(), Some("^/old(?:/)?$"));
    }
}

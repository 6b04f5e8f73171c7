//! End-to-end tests: requests through the axum router

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use folio::folio_router::{RedirectRule, RewriteRule, RoutesManifest};
use folio::*;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const BUILD_ID: &str = "test-build";

fn config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.build.build_id = BUILD_ID.to_string();
    config.build.dist_dir = dir.path().join(".folio");
    config.build.public_dir = dir.path().join("public");
    config
}

fn post(slug: &str) -> Params {
    let mut params = Params::new();
    params.insert("post".into(), ParamValue::from(slug));
    params
}

fn about() -> PageModule {
    PageModule::new("/about", |_: &RenderContext, _: &Value| {
        Ok(RenderOutput::new("<h1>About us</h1>"))
    })
}

fn blog(fallback: FallbackMode) -> PageModule {
    PageModule::new("/blog/[post]", |ctx: &RenderContext, data: &Value| {
        if ctx.is_fallback {
            return Ok(RenderOutput::new("<p>Loading...</p>"));
        }
        Ok(RenderOutput::new(format!("<article>{}</article>", data["title"].as_str().unwrap_or_default())))
    })
    .with_static_data(|ctx: DataContext| async move {
        let post = ctx.params.get("post").and_then(|p| p.as_single()).unwrap_or_default().to_string();
        Ok(StaticProps::new(json!({ "title": format!("Post {}", post) })))
    })
    .with_paths(move || async move {
        Ok(StaticPaths {
            paths: vec![post("a"), post("b")],
            fallback,
        })
    })
}

async fn app(config: Config, registry: PageRegistry, routes: RoutesManifest) -> App {
    App::builder(config, Arc::new(registry))
        .with_routes(routes)
        .init()
        .await
        .unwrap()
}

async fn get(app: &App, uri: &str) -> Response {
    app.router()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn wait_for_regeneration(app: &App, key: &str) {
    for _ in 0..200 {
        if !app.cache().is_regenerating(key) {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("regeneration of {} did not finish", key);
}

#[tokio::test]
async fn test_skeleton_fallback_then_full_page() {
    let dir = TempDir::new().unwrap();
    let app = app(
        config(&dir),
        PageRegistry::new().with_page(blog(FallbackMode::Skeleton)),
        RoutesManifest::default(),
    )
    .await;

    let response = get(&app, "/blog/c").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-folio-cache"], "MISS");
    let html = body(response).await;
    assert!(html.contains("Loading..."));
    assert!(html.contains(r#""isFallback":true"#));

    wait_for_regeneration(&app, "/blog/c").await;

    let response = get(&app, "/blog/c").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-folio-cache"], "HIT");
    assert!(body(response).await.contains("<article>Post c</article>"));
}

#[tokio::test]
async fn test_disabled_fallback_is_404() {
    let dir = TempDir::new().unwrap();
    let app = app(
        config(&dir),
        PageRegistry::new().with_page(blog(FallbackMode::Disabled)),
        RoutesManifest::default(),
    )
    .await;

    let response = get(&app, "/blog/unknown").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body(response).await.contains("This page could not be found."));

    let response = get(&app, "/blog/a").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body(response).await.contains("Post a"));
}

#[tokio::test]
async fn test_static_page_is_pinned() {
    let dir = TempDir::new().unwrap();
    let app = app(config(&dir), PageRegistry::new().with_page(about()), RoutesManifest::default()).await;

    let first = get(&app, "/about").await;
    assert_eq!(first.headers()["cache-control"], "s-maxage=31536000, stale-while-revalidate");
    let first = body(first).await;

    for _ in 0..3 {
        let response = get(&app, "/about").await;
        assert_eq!(response.headers()["cache-control"], "s-maxage=31536000, stale-while-revalidate");
        assert_eq!(response.headers()["x-folio-cache"], "HIT");
        assert_eq!(body(response).await, first);
    }
    assert_eq!(app.cache().stats().await.regenerations, 1);
}

#[tokio::test]
async fn test_redirect_rule() {
    let dir = TempDir::new().unwrap();
    let routes = RoutesManifest::default().with_redirect(RedirectRule::new("/old", "/new", 301));
    let app = app(config(&dir), PageRegistry::new(), routes).await;

    let response = get(&app, "/old").await;
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(response.headers()["location"], "/new");
}

#[tokio::test]
async fn test_rewrite_keeps_visible_path() {
    let dir = TempDir::new().unwrap();
    let article = PageModule::new("/articles/[slug]", |ctx: &RenderContext, _: &Value| {
        Ok(RenderOutput::new(format!("<p>slug={}</p>", ctx.param("slug").unwrap_or_default())))
    });
    let routes = RoutesManifest::default().with_rewrite(RewriteRule::new("/docs/:slug", "/articles/:slug"));
    let app = app(config(&dir), PageRegistry::new().with_page(article), routes).await;

    let response = get(&app, "/docs/intro").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("location").is_none());
    assert!(body(response).await.contains("<p>slug=intro</p>"));
}

#[tokio::test]
async fn test_page_data_endpoint() {
    let dir = TempDir::new().unwrap();
    let app = app(
        config(&dir),
        PageRegistry::new().with_page(blog(FallbackMode::Disabled)),
        RoutesManifest::default(),
    )
    .await;

    let response = get(&app, "/_internal/data/test-build/blog/a.json").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/json");
    let data: Value = serde_json::from_str(&body(response).await).unwrap();
    assert_eq!(data, json!({ "title": "Post a" }));

    // HTML request for the same path shares the entry
    let response = get(&app, "/blog/a").await;
    assert_eq!(response.headers()["x-folio-cache"], "HIT");

    let response = get(&app, "/_internal/data/old-build/blog/a.json").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_server_rendered_page_is_private() {
    let dir = TempDir::new().unwrap();
    let dash = PageModule::new("/dash", |_: &RenderContext, data: &Value| {
        Ok(RenderOutput::new(format!("<p>{}</p>", data["user"])))
    })
    .with_server_data(|_| async { Ok(json!({ "user": "ada" })) });
    let app = app(config(&dir), PageRegistry::new().with_page(dash), RoutesManifest::default()).await;

    let response = get(&app, "/dash").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-folio-cache"], "BYPASS");
    assert!(response.headers()["cache-control"].to_str().unwrap().starts_with("private"));
    assert!(app.cache().get("/dash").await.is_none());
}

#[tokio::test]
async fn test_preview_bypasses_cache() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir);
    config.preview.secret = Some("s3cret".to_string());
    let app = app(config, PageRegistry::new().with_page(about()), RoutesManifest::default()).await;

    let request = Request::builder()
        .uri("/about")
        .header("cookie", "theme=dark; __folio_preview=s3cret")
        .body(Body::empty())
        .unwrap();
    let response = app.router().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-folio-cache"], "BYPASS");
    assert!(response.headers()["cache-control"].to_str().unwrap().starts_with("private"));
    assert!(app.cache().get("/about").await.is_none());

    // A wrong token is an ordinary request
    let request = Request::builder()
        .uri("/about")
        .header("cookie", "__folio_preview=guess")
        .body(Body::empty())
        .unwrap();
    let response = app.router().oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-folio-cache"], "MISS");
}

#[tokio::test]
async fn test_development_mode_sends_no_cache_control() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir);
    config.server.dev = true;
    let app = app(config, PageRegistry::new().with_page(about()), RoutesManifest::default()).await;

    let response = get(&app, "/about").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("cache-control").is_none());
    assert_eq!(response.headers()["x-folio-cache"], "BYPASS");
}

#[tokio::test]
async fn test_custom_not_found_and_error_pages() {
    let dir = TempDir::new().unwrap();
    let not_found = PageModule::new(NOT_FOUND_PAGE, |_: &RenderContext, _: &Value| {
        Ok(RenderOutput::new("<h1>Nothing here</h1>"))
    });
    let error_page = PageModule::new(ERROR_PAGE, |_: &RenderContext, _: &Value| {
        Ok(RenderOutput::new("<h1>Something broke</h1>"))
    });
    let broken = PageModule::new("/broken", |_: &RenderContext, _: &Value| Err(anyhow::anyhow!("boom")));
    let registry = PageRegistry::new()
        .with_page(not_found)
        .with_page(error_page)
        .with_page(broken);
    let app = app(config(&dir), registry, RoutesManifest::default()).await;

    let response = get(&app, "/missing").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body(response).await.contains("Nothing here"));

    // Reserved pages are not routable themselves
    let response = get(&app, "/_error").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get(&app, "/broken").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body(response).await.contains("Something broke"));
}

#[tokio::test]
async fn test_built_in_error_page() {
    let dir = TempDir::new().unwrap();
    let broken = PageModule::new("/broken", |_: &RenderContext, _: &Value| Err(anyhow::anyhow!("boom")));
    let app = app(config(&dir), PageRegistry::new().with_page(broken), RoutesManifest::default()).await;

    let response = get(&app, "/broken").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body(response).await.contains("Internal server error."));
}

#[tokio::test]
async fn test_static_data_not_found() {
    let dir = TempDir::new().unwrap();
    let gone = PageModule::new("/gone", |_: &RenderContext, _: &Value| Ok(RenderOutput::new("never")))
        .with_static_data(|_| async { Ok(StaticProps::not_found()) });
    let app = app(config(&dir), PageRegistry::new().with_page(gone), RoutesManifest::default()).await;

    let response = get(&app, "/gone").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(app.cache().get("/gone").await.is_none());
}

#[tokio::test]
async fn test_unreachable_proxy_target_is_502() {
    let dir = TempDir::new().unwrap();
    let routes = RoutesManifest::default().with_rewrite(RewriteRule::new("/ext/:path*", "http://127.0.0.1:9/:path*"));
    let app = app(config(&dir), PageRegistry::new(), routes).await;

    let response = get(&app, "/ext/a/b").await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_public_files_and_build_assets() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    std::fs::create_dir_all(&config.build.public_dir).unwrap();
    std::fs::create_dir_all(config.build.dist_dir.join("static")).unwrap();
    std::fs::write(config.build.public_dir.join("robots.txt"), "User-agent: *").unwrap();
    std::fs::write(config.build.dist_dir.join("static/app-1a2b.js"), "console.log(1)").unwrap();
    let app = app(config, PageRegistry::new(), RoutesManifest::default()).await;

    let response = get(&app, "/robots.txt").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(response).await, "User-agent: *");

    let response = get(&app, "/_folio/static/app-1a2b.js").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["cache-control"], "public, max-age=31536000, immutable");
}

#[tokio::test]
async fn test_conflicting_page_fails_init() {
    let dir = TempDir::new().unwrap();
    let page = about()
        .with_static_data(|_| async { Ok(StaticProps::new(json!({}))) })
        .with_server_data(|_| async { Ok(json!({})) });

    let result = App::builder(config(&dir), Arc::new(PageRegistry::new().with_page(page)))
        .init()
        .await;
    assert!(matches!(result, Err(FolioError::ConflictingDataStrategy { .. })));
}

#[tokio::test]
async fn test_manifests_from_build_directory() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let registry = Arc::new(PageRegistry::new().with_page(blog(FallbackMode::Disabled)));

    Builder::new(registry.clone(), BUILD_ID)
        .with_routes_manifest(RoutesManifest::default().with_redirect(RedirectRule::new("/old", "/blog/a", 308)))
        .build_to(&config.build.dist_dir)
        .await
        .unwrap();

    let app = App::builder(config, registry).init().await.unwrap();
    assert_eq!(app.prerender_manifest().routes.len(), 2);
    assert_eq!(app.warm().await, 2);
    assert!(app.cache().get("/blog/b").await.is_some());

    let response = get(&app, "/old").await;
    assert_eq!(response.status(), StatusCode::PERMANENT_REDIRECT);
    assert_eq!(response.headers()["refresh"], "0;url=/blog/a");
}

#[tokio::test]
async fn test_reload_routes() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let dist = config.build.dist_dir.clone();
    RoutesManifest::default().save(&dist).unwrap();
    let app = App::builder(config, Arc::new(PageRegistry::new().with_page(about())))
        .init()
        .await
        .unwrap();

    assert_eq!(get(&app, "/team").await.status(), StatusCode::NOT_FOUND);

    RoutesManifest::default()
        .with_redirect(RedirectRule::new("/team", "/about", 307))
        .save(&dist)
        .unwrap();
    app.reload_routes().await.unwrap();
    assert_eq!(get(&app, "/team").await.status(), StatusCode::TEMPORARY_REDIRECT);

    // A broken manifest keeps the current rules
    std::fs::write(dist.join("routes-manifest.json"), "{ not json").unwrap();
    assert!(app.reload_routes().await.is_err());
    assert_eq!(get(&app, "/team").await.status(), StatusCode::TEMPORARY_REDIRECT);
}

#[tokio::test]
async fn test_prerendered_paths_with_sub_delimiters() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let page = PageModule::new("/blog/[post]", |ctx: &RenderContext, _: &Value| {
        Ok(RenderOutput::new(format!("<article>{}</article>", ctx.param("post").unwrap_or_default())))
    })
    .with_static_data(|_| async { Ok(StaticProps::new(json!({}))) })
    .with_paths(|| async {
        Ok(StaticPaths {
            paths: vec![post("hello,world"), post("c++"), post("12:30")],
            fallback: FallbackMode::Disabled,
        })
    });
    let registry = Arc::new(PageRegistry::new().with_page(page));

    Builder::new(registry.clone(), BUILD_ID)
        .build_to(&config.build.dist_dir)
        .await
        .unwrap();

    let app = App::builder(config, registry)
        .with_routes(RoutesManifest::default())
        .init()
        .await
        .unwrap();
    let mut keys: Vec<&str> = app.prerender_manifest().routes.keys().map(String::as_str).collect();
    keys.sort();
    assert_eq!(keys, vec!["/blog/12:30", "/blog/c++", "/blog/hello,world"]);
    assert_eq!(app.warm().await, 3);

    for (uri, post) in [
        ("/blog/hello,world", "hello,world"),
        ("/blog/hello%2Cworld", "hello,world"),
        ("/blog/c++", "c++"),
        ("/blog/12:30", "12:30"),
    ] {
        let response = get(&app, uri).await;
        assert_eq!(response.status(), StatusCode::OK, "{}", uri);
        assert_eq!(response.headers()["x-folio-cache"], "HIT", "{}", uri);
        assert!(body(response).await.contains(&format!("<article>{}</article>", post)));
    }

    assert_eq!(get(&app, "/blog/other").await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_request_query_not_shared_through_cache() {
    let dir = TempDir::new().unwrap();
    let greet = PageModule::new("/greet/[name]", |ctx: &RenderContext, _: &Value| {
        let name = ctx.query.get("name").map(String::as_str).unwrap_or("?");
        let via = ctx.query.get("ref").map(String::as_str).unwrap_or("-");
        Ok(RenderOutput::new(format!("<p>{} {}</p>", name, via)))
    });
    let search = PageModule::new("/search", |_: &RenderContext, data: &Value| {
        Ok(RenderOutput::new(format!("<p>results for {}</p>", data["q"].as_str().unwrap_or_default())))
    })
    .with_server_data(|ctx: DataContext| async move { Ok(json!({ "q": ctx.query.get("q").cloned() })) });
    let app = app(
        config(&dir),
        PageRegistry::new().with_page(greet).with_page(search),
        RoutesManifest::default(),
    )
    .await;

    let first = get(&app, "/greet/ada?ref=evil").await;
    assert_eq!(first.headers()["x-folio-cache"], "MISS");
    let first = body(first).await;
    assert!(first.contains("<p>ada -</p>"));
    assert!(!first.contains("evil"));

    let second = get(&app, "/greet/ada").await;
    assert_eq!(second.headers()["x-folio-cache"], "HIT");
    assert_eq!(body(second).await, first);

    // Per-request rendering still sees the query string
    assert!(body(get(&app, "/search?q=rust").await).await.contains("results for rust"));
}

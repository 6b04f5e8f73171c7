//! Integration tests for the staged routing pipeline

use folio_router::*;
use pretty_assertions::assert_eq;
use std::path::PathBuf;

fn query(pairs: &[(&str, &str)]) -> Query {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn page(resolution: Resolution) -> PageMatch {
    match resolution {
        Resolution::Page(page) => page,
        other => panic!("expected a page, got {:?}", other),
    }
}

#[test]
fn test_redirect_rule_returns_location() {
    let pipeline = Pipeline::new("b1")
        .with_redirect_rule(&RedirectRule::new("/old", "/new", 301))
        .unwrap()
        .with_page("/new")
        .unwrap();

    assert_eq!(
        pipeline.resolve(&PipelineRequest::new("/old")),
        Resolution::Redirect {
            status: 301,
            location: "/new".to_string(),
            headers: vec![],
        }
    );
}

#[test]
fn test_redirect_substitutes_params_and_keeps_query() {
    let pipeline = Pipeline::new("b1")
        .with_redirect_rule(&RedirectRule::new("/blog/:slug", "/posts/:slug?from=blog", 308))
        .unwrap();

    let request = PipelineRequest::new("/blog/hello world").with_query(query(&[("ref", "x")]));
    match pipeline.resolve(&request) {
        Resolution::Redirect { status, location, .. } => {
            assert_eq!(status, 308);
            assert_eq!(location, "/posts/hello%20world?from=blog&ref=x");
        }
        other => panic!("expected redirect, got {:?}", other),
    }
}

#[test]
fn test_rewrite_routes_to_dynamic_page() {
    let pipeline = Pipeline::new("b1")
        .with_rewrite_rule(&RewriteRule::new("/docs/:slug", "/articles/:slug"))
        .unwrap()
        .with_page("/articles/[slug]")
        .unwrap();

    let matched = page(pipeline.resolve(&PipelineRequest::new("/docs/intro")));

    assert_eq!(matched.page, "/articles/[slug]");
    assert_eq!(matched.path, "/articles/intro");
    assert_eq!(matched.original_path, "/docs/intro");
    assert_eq!(matched.params["slug"].as_single(), Some("intro"));
    assert_eq!(matched.query, query(&[("slug", "intro")]));
    assert!(matched.rewritten);
}

#[test]
fn test_rewrite_does_not_reenter_rewrite_stage() {
    let pipeline = Pipeline::new("b1")
        .with_rewrite_rule(&RewriteRule::new("/a", "/b"))
        .unwrap()
        .with_rewrite_rule(&RewriteRule::new("/b", "/a"))
        .unwrap()
        .with_page("/b")
        .unwrap();

    let matched = page(pipeline.resolve(&PipelineRequest::new("/a")));
    assert_eq!(matched.page, "/b");
}

#[test]
fn test_rewrite_merges_unused_params_into_query() {
    let pipeline = Pipeline::new("b1")
        .with_rewrite_rule(&RewriteRule::new("/shop/:category/:item", "/item/:item?view=full"))
        .unwrap()
        .with_page("/item/[id]")
        .unwrap();

    let matched = page(pipeline.resolve(&PipelineRequest::new("/shop/books/42")));
    assert_eq!(
        matched.query,
        query(&[("category", "books"), ("id", "42"), ("view", "full")])
    );
}

#[test]
fn test_route_query_excludes_request_query() {
    let pipeline = Pipeline::new("b1")
        .with_rewrite_rule(&RewriteRule::new("/shop/:category/:item", "/item/:item?view=full"))
        .unwrap()
        .with_page("/item/[id]")
        .unwrap();

    let request = PipelineRequest::new("/shop/books/42").with_query(query(&[("utm", "mail"), ("view", "mine")]));
    let matched = page(pipeline.resolve(&request));

    assert_eq!(
        matched.route_query,
        query(&[("category", "books"), ("id", "42"), ("view", "full")])
    );
    assert_eq!(
        matched.query,
        query(&[("category", "books"), ("id", "42"), ("utm", "mail"), ("view", "full")])
    );
}

#[test]
fn test_external_rewrite_proxies() {
    let pipeline = Pipeline::new("b1")
        .with_rewrite_rule(&RewriteRule::new("/api/:path*", "https://api.example.com/:path*"))
        .unwrap();

    let request = PipelineRequest::new("/api/users/1").with_host("localhost:3000");
    assert_eq!(
        pipeline.resolve(&request),
        Resolution::Proxy {
            url: "https://api.example.com/users/1".to_string(),
            headers: vec![],
        }
    );
}

#[test]
fn test_same_host_rewrite_stays_internal() {
    let pipeline = Pipeline::new("b1")
        .with_rewrite_rule(&RewriteRule::new("/old-home", "http://localhost:3000/home"))
        .unwrap()
        .with_page("/home")
        .unwrap();

    let request = PipelineRequest::new("/old-home").with_host("localhost:3000");
    assert_eq!(page(pipeline.resolve(&request)).page, "/home");
}

#[test]
fn test_header_rules_accumulate_and_continue() {
    let pipeline = Pipeline::new("b1")
        .with_header_rule(&HeaderRule {
            source: "/:path*".into(),
            headers: vec![HeaderEntry {
                key: "x-frame-options".into(),
                value: "DENY".into(),
            }],
            regex: None,
        })
        .unwrap()
        .with_header_rule(&HeaderRule {
            source: "/blog/:post".into(),
            headers: vec![HeaderEntry {
                key: "x-post".into(),
                value: ":post".into(),
            }],
            regex: None,
        })
        .unwrap()
        .with_page("/blog/[post]")
        .unwrap();

    let matched = page(pipeline.resolve(&PipelineRequest::new("/blog/hello")));
    assert_eq!(
        matched.headers,
        vec![
            ("x-frame-options".to_string(), "DENY".to_string()),
            ("x-post".to_string(), "hello".to_string()),
        ]
    );
}

#[test]
fn test_static_file_beats_pages() {
    let pipeline = Pipeline::new("b1")
        .with_static_file("/robots.txt", "public/robots.txt", false)
        .unwrap()
        .with_page("/[slug]")
        .unwrap();

    assert_eq!(
        pipeline.resolve(&PipelineRequest::new("/robots.txt")),
        Resolution::File {
            path: PathBuf::from("public/robots.txt"),
            immutable: false,
            headers: vec![],
        }
    );
}

#[test]
fn test_exact_page_beats_dynamic() {
    let pipeline = Pipeline::new("b1")
        .with_page("/blog/[post]")
        .unwrap()
        .with_page("/blog/archive")
        .unwrap();

    assert_eq!(page(pipeline.resolve(&PipelineRequest::new("/blog/archive"))).page, "/blog/archive");
    assert_eq!(page(pipeline.resolve(&PipelineRequest::new("/blog/other"))).page, "/blog/[post]");
}

#[test]
fn test_trailing_slash_normalized() {
    let pipeline = Pipeline::new("b1").with_page("/about").unwrap();
    let matched = page(pipeline.resolve(&PipelineRequest::new("/about/")));
    assert_eq!(matched.path, "/about");
}

#[test]
fn test_data_request_resolves_page() {
    let pipeline = Pipeline::new("b1").with_page("/blog/[post]").unwrap().with_page("/").unwrap();

    let matched = page(pipeline.resolve(&PipelineRequest::new("/_internal/data/b1/blog/a.json")));
    assert!(matched.data_request);
    assert_eq!(matched.path, "/blog/a");

    let root = page(pipeline.resolve(&PipelineRequest::new("/_internal/data/b1/index.json")));
    assert_eq!(root.page, "/");
}

#[test]
fn test_data_request_wrong_build_is_not_found() {
    let pipeline = Pipeline::new("b1").with_page("/blog/[post]").unwrap();
    assert_eq!(
        pipeline.resolve(&PipelineRequest::new("/_internal/data/b0/blog/a.json")),
        Resolution::NotFound {
            data_request: true,
            headers: vec![],
        }
    );
}

#[test]
fn test_unmatched_is_not_found() {
    let pipeline = Pipeline::new("b1").with_page("/blog/[post]").unwrap();
    assert!(matches!(
        pipeline.resolve(&PipelineRequest::new("/nowhere/at/all")),
        Resolution::NotFound { data_request: false, .. }
    ));
}

#[test]
fn test_equivalent_dynamic_pages_rejected() {
    let err = Pipeline::new("b1")
        .with_page("/blog/[post]")
        .unwrap()
        .with_page("/blog/[slug]")
        .unwrap_err();
    assert!(matches!(err, RouteError::MalformedRoute { .. }));

    let err = Pipeline::new("b1")
        .with_page("/about")
        .unwrap()
        .with_page("/about/")
        .unwrap_err();
    assert!(matches!(err, RouteError::MalformedRoute { .. }));
}

#[test]
fn test_replace_rules_keeps_old_rules_on_error() {
    let mut pipeline = Pipeline::new("b1")
        .with_routes_manifest(
            &RoutesManifest::default().with_redirect(RedirectRule::new("/a", "/b", 307)),
        )
        .unwrap();

    let broken = RoutesManifest::default().with_redirect(RedirectRule::new("/[x", "/b", 307));
    assert!(pipeline.replace_rules(&broken).is_err());
    assert!(matches!(
        pipeline.resolve(&PipelineRequest::new("/a")),
        Resolution::Redirect { status: 307, .. }
    ));

    pipeline.replace_rules(&RoutesManifest::default()).unwrap();
    assert!(matches!(
        pipeline.resolve(&PipelineRequest::new("/a")),
        Resolution::NotFound { .. }
    ));
}

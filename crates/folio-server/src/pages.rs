//! Demo pages, one per render strategy

use folio::folio_router::{HeaderEntry, HeaderRule, RedirectRule, RewriteRule, RoutesManifest};
use folio::{
    FallbackMode, PageModule, PageRegistry, ParamValue, Params, RenderContext, RenderOutput, Revalidate, StaticPaths,
    StaticProps,
};
use maud::html;
use serde_json::{json, Value};

const POSTS: &[(&str, &str)] = &[
    ("hello-world", "Hello, world"),
    ("regeneration", "Pages that rebuild themselves"),
];

pub fn registry() -> PageRegistry {
    PageRegistry::new()
        .with_page(home())
        .with_page(about())
        .with_page(blog_post())
        .with_page(clock())
        .with_page(not_found())
}

/// Header, redirect and rewrite rules of the demo site
pub fn routes() -> RoutesManifest {
    RoutesManifest::default()
        .with_header(HeaderRule {
            source: "/:path*".to_string(),
            headers: vec![HeaderEntry {
                key: "x-content-type-options".to_string(),
                value: "nosniff".to_string(),
            }],
            regex: None,
        })
        .with_redirect(RedirectRule::new("/posts/:post", "/blog/:post", 308))
        .with_rewrite(RewriteRule::new("/articles/:post", "/blog/:post"))
}

fn home() -> PageModule {
    PageModule::new("/", |_: &RenderContext, _: &Value| {
        Ok(RenderOutput::from(html! {
            h1 { "folio" }
            ul {
                li { a href="/about" { "About (static)" } }
                @for (slug, title) in POSTS {
                    li { a href={ "/blog/" (slug) } { (title) " (regenerated)" } }
                }
                li { a href="/blog/draft" { "A post generated on first request" } }
                li { a href="/clock" { "Clock (server-rendered)" } }
            }
        })
        .with_head("<title>folio</title>"))
    })
}

fn about() -> PageModule {
    PageModule::new("/about", |_: &RenderContext, _: &Value| {
        Ok(RenderOutput::from(html! {
            h1 { "About" }
            p { "Rendered once, cached forever." }
        }))
    })
}

fn blog_post() -> PageModule {
    PageModule::new("/blog/[post]", |ctx: &RenderContext, data: &Value| {
        if ctx.is_fallback {
            return Ok(RenderOutput::from(html! { p { "Loading post..." } }));
        }
        Ok(RenderOutput::from(html! {
            article {
                h1 { (data["title"].as_str().unwrap_or_default()) }
                p { "Generated at " (data["generated_at"].as_str().unwrap_or_default()) }
            }
        }))
    })
    .with_static_data(|ctx| async move {
        let slug = ctx.params.get("post").and_then(ParamValue::as_single).unwrap_or_default();
        let title = POSTS
            .iter()
            .find(|(s, _)| *s == slug)
            .map(|(_, title)| title.to_string())
            .unwrap_or_else(|| format!("Draft: {}", slug));

        Ok(StaticProps::new(json!({
            "title": title,
            "generated_at": chrono::Utc::now().to_rfc3339(),
        })))
    })
    .with_paths(|| async {
        let paths = POSTS
            .iter()
            .map(|(slug, _)| {
                let mut params = Params::new();
                params.insert("post".to_string(), ParamValue::from(*slug));
                params
            })
            .collect();
        Ok(StaticPaths {
            paths,
            fallback: FallbackMode::Skeleton,
        })
    })
    .with_revalidate(Revalidate::After(30))
}

fn clock() -> PageModule {
    PageModule::new("/clock", |_: &RenderContext, data: &Value| {
        Ok(RenderOutput::from(html! {
            p { "Server time: " (data["now"].as_str().unwrap_or_default()) }
        }))
    })
    .with_server_data(|_| async { Ok(json!({ "now": chrono::Utc::now().to_rfc3339() })) })
}

fn not_found() -> PageModule {
    PageModule::new(folio::NOT_FOUND_PAGE, |_: &RenderContext, _: &Value| {
        Ok(RenderOutput::from(html! {
            h1 { "Not here" }
            a href="/" { "Back home" }
        }))
    })
}

//! The routing pipeline
//!
//! Stages run in a fixed order, first-match-wins within each stage:
//!
//! 1. headers (every match contributes, never terminates)
//! 2. redirects (terminate with 3xx)
//! 3. rewrites (proxy foreign destinations, otherwise continue with the new path)
//! 4. static files (exact path)
//! 5. exact pages
//! 6. dynamic pages, in sorted order
//!
//! A rewritten request does not pass the header, redirect or rewrite stages a
//! second time, so rewrite chains cannot loop.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::debug;

use crate::data::{parse_data_path, DataPath};
use crate::error::{Result, RouteError};
use crate::manifest::RoutesManifest;
use crate::params::{Params, Query};
use crate::path::normalize_path;
use crate::route::sorter::compare_patterns;
use crate::rule::{
    format_query, is_external, referenced_params, split_destination, substitute, HeaderRule,
    RedirectRule, RewriteRule,
};
use crate::{Route, RouteAction};

/// Response headers accumulated while routing, in rule order
pub type ResponseHeaders = Vec<(String, String)>;

/// The parts of an inbound request the pipeline looks at
#[derive(Debug, Clone, Default)]
pub struct PipelineRequest {
    /// URL path, not necessarily normalized
    pub path: String,
    pub query: Query,
    /// `Host` header, used to tell same-origin rewrite URLs from foreign ones
    pub host: Option<String>,
}

impl PipelineRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_query(mut self, query: Query) -> Self {
        self.query = query;
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }
}

/// A request resolved to a page
#[derive(Debug, Clone, PartialEq)]
pub struct PageMatch {
    /// Template the page was registered under (`/blog/[post]`)
    pub page: String,
    /// Concrete path being rendered, after rewrites
    pub path: String,
    /// Path as requested by the client
    pub original_path: String,
    pub params: Params,
    /// Request query merged with rewrite and route parameters
    pub query: Query,
    /// Rewrite and route parameters only, without the client's query string
    pub route_query: Query,
    pub headers: ResponseHeaders,
    /// Request came in through the page-data endpoint
    pub data_request: bool,
    pub rewritten: bool,
}

/// Outcome of running a request through the pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Redirect {
        status: u16,
        location: String,
        headers: ResponseHeaders,
    },
    Proxy {
        url: String,
        headers: ResponseHeaders,
    },
    File {
        path: PathBuf,
        immutable: bool,
        headers: ResponseHeaders,
    },
    Page(PageMatch),
    NotFound {
        data_request: bool,
        headers: ResponseHeaders,
    },
}

/// Ordered route groups evaluated against each request
///
/// Built once at startup with the `with_*` builders and treated as immutable
/// while serving; [`Pipeline::replace_rules`] swaps the rule stages when a
/// routes manifest is reloaded in development.
#[derive(Debug, Clone)]
pub struct Pipeline {
    build_id: String,
    headers: Vec<Route>,
    redirects: Vec<Route>,
    rewrites: Vec<Route>,
    files: HashMap<String, Route>,
    pages: HashMap<String, Route>,
    dynamic: Vec<Route>,
}

impl Pipeline {
    pub fn new(build_id: impl Into<String>) -> Self {
        Self {
            build_id: build_id.into(),
            headers: Vec::new(),
            redirects: Vec::new(),
            rewrites: Vec::new(),
            files: HashMap::new(),
            pages: HashMap::new(),
            dynamic: Vec::new(),
        }
    }

    // ========================================================================
    // Builder Methods
    // ========================================================================

    pub fn with_header_rule(mut self, rule: &HeaderRule) -> Result<Self> {
        self.headers.push(Route::header(rule)?);
        Ok(self)
    }

    pub fn with_redirect_rule(mut self, rule: &RedirectRule) -> Result<Self> {
        self.redirects.push(Route::redirect(rule)?);
        Ok(self)
    }

    pub fn with_rewrite_rule(mut self, rule: &RewriteRule) -> Result<Self> {
        self.rewrites.push(Route::rewrite(rule)?);
        Ok(self)
    }

    /// Adds every rule of a routes manifest, keeping manifest order
    pub fn with_routes_manifest(mut self, manifest: &RoutesManifest) -> Result<Self> {
        self.replace_rules(manifest)?;
        Ok(self)
    }

    /// Serves `file` at exactly `url_path`
    pub fn with_static_file(
        mut self,
        url_path: &str,
        file: impl Into<PathBuf>,
        immutable: bool,
    ) -> Result<Self> {
        let key = normalize_path(url_path).into_owned();
        let route = Route::file(&key, file, immutable)?;
        self.files.insert(key, route);
        Ok(self)
    }

    /// Registers a page template
    ///
    /// Static templates go to the exact-match table; dynamic ones are kept in
    /// matching order. Registering the same path twice, or two dynamic
    /// templates that differ only in parameter names, is a `MalformedRoute`.
    pub fn with_page(mut self, template: &str) -> Result<Self> {
        let route = Route::page(template)?;

        if route.pattern.is_dynamic() {
            if let Some(existing) = self
                .dynamic
                .iter()
                .find(|r| same_shape(r.pattern.segments(), route.pattern.segments()))
            {
                return Err(RouteError::MalformedRoute {
                    template: template.to_string(),
                    reason: format!("conflicts with already registered `{}`", existing.pattern),
                });
            }
            self.dynamic.push(route);
            self.dynamic
                .sort_by(|a, b| compare_patterns(&a.pattern, &b.pattern));
        } else {
            let key = normalize_path(template).into_owned();
            if self.pages.contains_key(&key) {
                return Err(RouteError::MalformedRoute {
                    template: template.to_string(),
                    reason: "page registered twice".to_string(),
                });
            }
            self.pages.insert(key, route);
        }

        Ok(self)
    }

    /// Replaces header, redirect and rewrite stages from a manifest
    ///
    /// All rules are compiled before anything is swapped, so a bad manifest
    /// leaves the current rules in place.
    pub fn replace_rules(&mut self, manifest: &RoutesManifest) -> Result<()> {
        let headers = manifest
            .headers
            .iter()
            .map(Route::header)
            .collect::<Result<Vec<_>>>()?;
        let redirects = manifest
            .redirects
            .iter()
            .map(Route::redirect)
            .collect::<Result<Vec<_>>>()?;
        let rewrites = manifest
            .rewrites
            .iter()
            .map(Route::rewrite)
            .collect::<Result<Vec<_>>>()?;

        self.headers = headers;
        self.redirects = redirects;
        self.rewrites = rewrites;
        Ok(())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn build_id(&self) -> &str {
        &self.build_id
    }

    /// Dynamic page routes in matching order
    pub fn dynamic_routes(&self) -> &[Route] {
        &self.dynamic
    }

    /// Whether a page template is registered
    pub fn has_page(&self, template: &str) -> bool {
        self.pages.values().any(|r| r.pattern.source() == template)
            || self.dynamic.iter().any(|r| r.pattern.source() == template)
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Runs a request through every stage
    pub fn resolve(&self, request: &PipelineRequest) -> Resolution {
        let normalized = normalize_path(&request.path).into_owned();
        let (mut path, data_request) = match parse_data_path(&normalized, &self.build_id) {
            DataPath::Page => (normalized, false),
            DataPath::Data(page_path) => (page_path, true),
            DataPath::Invalid => {
                debug!(path = %normalized, "data request for unknown build");
                return Resolution::NotFound {
                    data_request: true,
                    headers: ResponseHeaders::new(),
                };
            }
        };
        let original_path = path.clone();
        let mut query = request.query.clone();
        let mut route_query = Query::new();
        let mut headers = ResponseHeaders::new();

        // 1. Headers
        for route in &self.headers {
            if let (Some(params), RouteAction::Headers(entries)) = (route.matches(&path), &route.action) {
                headers.extend(
                    entries
                        .iter()
                        .map(|e| (e.key.clone(), substitute(&e.value, &params, false))),
                );
            }
        }

        // 2. Redirects
        if let Some((route, params)) = first_match(&self.redirects, &path) {
            if let RouteAction::Redirect { destination, status } = &route.action {
                let (target, target_query) = split_destination(&substitute(destination, &params, true));
                let mut merged = request.query.clone();
                merged.extend(target_query);
                let location = with_query(&target, &merged);
                debug!(path = %path, location = %location, status, "redirect");
                return Resolution::Redirect {
                    status: *status,
                    location,
                    headers,
                };
            }
        }

        // 3. Rewrites
        let mut rewritten = false;
        if let Some((route, params)) = first_match(&self.rewrites, &path) {
            if let RouteAction::Rewrite { destination } = &route.action {
                let (target, target_query) = split_destination(&substitute(destination, &params, true));

                let used = referenced_params(destination);
                for (name, value) in &params {
                    if !used.contains(name) {
                        route_query.insert(name.clone(), value.to_path_string());
                    }
                }
                route_query.extend(target_query);
                query.extend(route_query.clone());

                let local = if is_external(&target) {
                    same_origin_path(&target, request.host.as_deref())
                } else {
                    Some(target.clone())
                };

                match local {
                    Some(local_path) => {
                        debug!(from = %path, to = %local_path, "rewrite");
                        path = normalize_path(&local_path).into_owned();
                        rewritten = true;
                    }
                    None => {
                        let url = with_query(&target, &query);
                        debug!(path = %path, url = %url, "proxy rewrite");
                        return Resolution::Proxy { url, headers };
                    }
                }
            }
        }

        // 4. Static files
        if !data_request {
            if let Some(RouteAction::File { path: file, immutable }) =
                self.files.get(&path).map(|r| &r.action)
            {
                return Resolution::File {
                    path: file.clone(),
                    immutable: *immutable,
                    headers,
                };
            }
        }

        // 5. Exact pages
        if let Some(RouteAction::Page { page }) = self.pages.get(&path).map(|r| &r.action) {
            return Resolution::Page(PageMatch {
                page: page.clone(),
                path,
                original_path,
                params: Params::new(),
                query,
                route_query,
                headers,
                data_request,
                rewritten,
            });
        }

        // 6. Dynamic pages
        if let Some((route, params)) = first_match(&self.dynamic, &path) {
            if let RouteAction::Page { page } = &route.action {
                for (name, value) in &params {
                    route_query.insert(name.clone(), value.to_path_string());
                    query.insert(name.clone(), value.to_path_string());
                }
                return Resolution::Page(PageMatch {
                    page: page.clone(),
                    path,
                    original_path,
                    params,
                    query,
                    route_query,
                    headers,
                    data_request,
                    rewritten,
                });
            }
        }

        debug!(path = %path, "no route matched");
        Resolution::NotFound {
            data_request,
            headers,
        }
    }
}

fn first_match<'a>(routes: &'a [Route], path: &str) -> Option<(&'a Route, Params)> {
    routes
        .iter()
        .find_map(|route| route.matches(path).map(|params| (route, params)))
}

fn with_query(path: &str, query: &Query) -> String {
    if query.is_empty() {
        path.to_string()
    } else {
        format!("{}?{}", path, format_query(query))
    }
}

/// Path of an absolute URL when it points back at the requesting host
fn same_origin_path(target: &str, host: Option<&str>) -> Option<String> {
    let host = host?;
    let url = url::Url::parse(target).ok()?;
    let authority = match url.port() {
        Some(port) => format!("{}:{}", url.host_str()?, port),
        None => url.host_str()?.to_string(),
    };
    (authority.eq_ignore_ascii_case(host)).then(|| url.path().to_string())
}

/// Two dynamic templates that would accept exactly the same paths
fn same_shape(a: &[crate::Segment], b: &[crate::Segment]) -> bool {
    use crate::Segment::*;

    a.len() == b.len()
        && a.iter().zip(b).all(|pair| match pair {
            (Static(x), Static(y)) => x == y,
            (Dynamic(_), Dynamic(_))
            | (CatchAll(_), CatchAll(_))
            | (OptionalCatchAll(_), OptionalCatchAll(_)) => true,
            _ => false,
        })
}

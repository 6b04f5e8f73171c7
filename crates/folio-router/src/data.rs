//! Page-data endpoint paths: `/_internal/data/<buildId>/<route>.json`

use crate::route::parser::segments_regex;
use crate::route::RoutePattern;

/// URL prefix of the page-data endpoint
pub const DATA_PREFIX: &str = "/_internal/data/";

/// Outcome of inspecting a request path for the page-data endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataPath {
    /// Not a data request
    Page,
    /// A data request for this page path under the current build
    Data(String),
    /// A data-endpoint path that cannot be served (wrong build id or malformed)
    Invalid,
}

/// Classifies a normalized request path
///
/// ```
/// use folio_router::data::{parse_data_path, DataPath};
///
/// assert_eq!(parse_data_path("/_internal/data/b1/blog/a.json", "b1"), DataPath::Data("/blog/a".into()));
/// assert_eq!(parse_data_path("/_internal/data/b1/index.json", "b1"), DataPath::Data("/".into()));
/// assert_eq!(parse_data_path("/_internal/data/old/index.json", "b1"), DataPath::Invalid);
/// assert_eq!(parse_data_path("/blog/a", "b1"), DataPath::Page);
/// ```
pub fn parse_data_path(path: &str, build_id: &str) -> DataPath {
    let Some(rest) = path.strip_prefix(DATA_PREFIX) else {
        return DataPath::Page;
    };

    let Some((build, route)) = rest.split_once('/') else {
        return DataPath::Invalid;
    };

    if build != build_id {
        return DataPath::Invalid;
    }

    match route.strip_suffix(".json") {
        Some("") | None => DataPath::Invalid,
        Some("index") => DataPath::Data("/".to_string()),
        Some(inner) => DataPath::Data(format!("/{}", inner)),
    }
}

/// Data route for a concrete page path
///
/// ```
/// use folio_router::data::data_route;
///
/// assert_eq!(data_route("b1", "/"), "/_internal/data/b1/index.json");
/// assert_eq!(data_route("b1", "/blog/a"), "/_internal/data/b1/blog/a.json");
/// ```
pub fn data_route(build_id: &str, page_path: &str) -> String {
    let route = match page_path.trim_start_matches('/') {
        "" => "index",
        other => other,
    };
    format!("{}{}/{}.json", DATA_PREFIX, build_id, route)
}

/// Anchored regex matching data routes of a (dynamic) page pattern
pub fn data_route_regex(pattern: &RoutePattern, build_id: &str) -> String {
    let body = if pattern.segments().is_empty() {
        "/index".to_string()
    } else {
        segments_regex(pattern.segments())
    };
    format!(
        "^{}{}{}\\.json$",
        regex::escape(DATA_PREFIX),
        regex::escape(build_id),
        body
    )
}

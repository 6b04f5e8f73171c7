// File: src/response.rs
// Purpose: Turn routing and render results into HTTP responses

use crate::outcome::{CachePolicy, Served};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use folio_isr::Revalidate;
use folio_router::ResponseHeaders;
use maud::{html, Markup, DOCTYPE};

/// Reports whether a page came from the cache
pub const CACHE_STATUS_HEADER: &str = "x-folio-cache";

/// Cache-Control of fingerprinted build assets
pub const IMMUTABLE_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Cache-Control of per-user responses
pub const PRIVATE_CACHE_CONTROL: &str = "private, no-cache, no-store, max-age=0, must-revalidate";

/// Shared-cache lifetime announced for entries that never revalidate (one year)
const NEVER_REVALIDATE_SECONDS: u64 = 31_536_000;

/// Cache-Control for a rendered page; `None` in development
///
/// ```
/// use folio::response::cache_control;
/// use folio::CachePolicy;
/// use folio_isr::Revalidate;
///
/// assert_eq!(
///     cache_control(CachePolicy::Shared(Revalidate::After(10)), false).as_deref(),
///     Some("s-maxage=10, stale-while-revalidate")
/// );
/// assert_eq!(cache_control(CachePolicy::Private, true), None);
/// ```
pub fn cache_control(policy: CachePolicy, dev: bool) -> Option<String> {
    if dev {
        return None;
    }

    Some(match policy {
        CachePolicy::Private => PRIVATE_CACHE_CONTROL.to_string(),
        CachePolicy::Shared(Revalidate::Never) => {
            format!("s-maxage={}, stale-while-revalidate", NEVER_REVALIDATE_SECONDS)
        }
        CachePolicy::Shared(Revalidate::After(secs)) => {
            format!("s-maxage={}, stale-while-revalidate", secs)
        }
    })
}

// -- Shared helpers --

fn insert_header(headers: &mut HeaderMap, key: &str, value: &str) {
    if let (Ok(name), Ok(val)) = (HeaderName::from_bytes(key.as_bytes()), HeaderValue::from_str(value)) {
        headers.append(name, val);
    }
}

/// Adds headers collected by the routing pipeline
pub fn apply_headers(response: &mut Response, headers: &ResponseHeaders) {
    for (key, value) in headers {
        insert_header(response.headers_mut(), key, value);
    }
}

/// A rendered page, or its data alone for the page-data endpoint
pub fn page_response(served: &Served, data_request: bool, route_headers: &ResponseHeaders, dev: bool) -> Response {
    let mut response = if data_request {
        json_response(StatusCode::OK, served.page_data.to_string())
    } else {
        (StatusCode::OK, Html(served.markup.clone())).into_response()
    };

    apply_headers(&mut response, route_headers);
    let headers = response.headers_mut();
    if let Some(value) = cache_control(served.policy, dev) {
        insert_header(headers, header::CACHE_CONTROL.as_str(), &value);
    }
    insert_header(headers, CACHE_STATUS_HEADER, served.status.as_str());
    response
}

/// A 3xx response; 308 also carries a `Refresh` header for clients that ignore it
pub fn redirect_response(status: u16, location: &str, route_headers: &ResponseHeaders) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::TEMPORARY_REDIRECT);
    let mut response = status.into_response();

    apply_headers(&mut response, route_headers);
    let headers = response.headers_mut();
    insert_header(headers, header::LOCATION.as_str(), location);
    if status == StatusCode::PERMANENT_REDIRECT {
        insert_header(headers, header::REFRESH.as_str(), &format!("0;url={}", location));
    }
    response
}

/// An error page with the given status
///
/// Data requests get a JSON body instead of markup.
pub fn error_response(status: StatusCode, markup: String, data_request: bool, route_headers: &ResponseHeaders) -> Response {
    let mut response = if data_request {
        json_response(status, serde_json::json!({ "status": status.as_u16() }).to_string())
    } else {
        (status, Html(markup)).into_response()
    };

    apply_headers(&mut response, route_headers);
    insert_header(response.headers_mut(), header::CACHE_CONTROL.as_str(), PRIVATE_CACHE_CONTROL);
    response
}

fn json_response(status: StatusCode, body: String) -> Response {
    (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}

/// Built-in page for 404 responses when the app registers none
pub fn not_found_page() -> Markup {
    status_page(404, "This page could not be found.")
}

/// Built-in page for 500 responses when the app registers none
pub fn server_error_page() -> Markup {
    status_page(500, "Internal server error.")
}

/// Built-in page for 502 responses from proxied rewrites
pub fn bad_gateway_page() -> Markup {
    status_page(502, "The upstream server could not be reached.")
}

fn status_page(status: u16, message: &str) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                title { (status) ": " (message) }
            }
            body style="font-family: system-ui, sans-serif; display: flex; height: 100vh; align-items: center; justify-content: center; margin: 0;" {
                div {
                    h1 style="display: inline-block; margin: 0 20px 0 0; padding-right: 23px; border-right: 1px solid rgba(0,0,0,.3); font-size: 24px; font-weight: 500;" {
                        (status)
                    }
                    h2 style="display: inline-block; font-size: 14px; font-weight: normal; margin: 0;" {
                        (message)
                    }
                }
            }
        }
    }
}

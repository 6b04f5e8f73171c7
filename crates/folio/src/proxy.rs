// File: src/proxy.rs
// Purpose: Forward requests for external rewrite destinations

use crate::error::{FolioError, Result};
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use std::time::Duration;
use tracing::debug;

/// Connection-scoped headers never forwarded in either direction
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
];

/// HTTP client for proxied rewrites
#[derive(Clone)]
pub struct Proxy {
    client: reqwest::Client,
}

impl Proxy {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()
            .map_err(|e| FolioError::Config(format!("cannot build proxy client: {}", e)))?;
        Ok(Self { client })
    }

    /// Sends the request to `url` and relays the upstream response
    ///
    /// Redirects from upstream are relayed, not followed.
    pub async fn forward(&self, url: &str, method: Method, headers: &HeaderMap, body: Bytes) -> Result<Response> {
        debug!(url = %url, method = %method, "proxying request");

        let upstream = self
            .client
            .request(method, url)
            .headers(strip_hop_by_hop(headers))
            .body(body)
            .send()
            .await
            .map_err(|e| FolioError::Proxy(format!("{}: {}", url, e)))?;

        let status = StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
        let response_headers = strip_hop_by_hop(upstream.headers());
        let bytes = upstream
            .bytes()
            .await
            .map_err(|e| FolioError::Proxy(format!("{}: {}", url, e)))?;

        let mut response = (status, Body::from(bytes)).into_response();
        response.headers_mut().extend(response_headers);
        Ok(response)
    }
}

fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = headers.clone();
    for name in HOP_BY_HOP {
        forwarded.remove(*name);
    }
    forwarded
}

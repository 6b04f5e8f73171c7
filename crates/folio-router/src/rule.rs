//! Header, redirect and rewrite rules as configured by the application
//!
//! Rules are plain serde types so they can be persisted in the routes
//! manifest; [`crate::Route`] holds their compiled form.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RouteError};
use crate::params::{Params, Query};

static PARAM_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":([A-Za-z0-9_]+)[*+?]?").expect("static regex"));

/// A single response header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderEntry {
    pub key: String,
    pub value: String,
}

/// Adds response headers to every path matching `source`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderRule {
    pub source: String,
    pub headers: Vec<HeaderEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
}

/// Redirects paths matching `source` to `destination`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectRule {
    pub source: String,
    pub destination: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permanent: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
}

impl RedirectRule {
    pub fn new(source: impl Into<String>, destination: impl Into<String>, status_code: u16) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            status_code: Some(status_code),
            permanent: None,
            regex: None,
        }
    }

    /// Resolves the redirect status
    ///
    /// An explicit `statusCode` wins; otherwise `permanent: true` is 308 and
    /// anything else 307.
    pub fn status(&self) -> Result<u16> {
        match (self.status_code, self.permanent) {
            (Some(code @ (301 | 302 | 303 | 307 | 308)), _) => Ok(code),
            (Some(code), _) => Err(RouteError::invalid_rule(
                &self.source,
                format!("unsupported redirect status {}", code),
            )),
            (None, Some(true)) => Ok(308),
            (None, _) => Ok(307),
        }
    }
}

/// Serves `destination` for paths matching `source` without changing the visible URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteRule {
    pub source: String,
    pub destination: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
}

impl RewriteRule {
    pub fn new(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            regex: None,
        }
    }
}

/// Whether a destination points at another origin
pub fn is_external(destination: &str) -> bool {
    destination.starts_with("http://") || destination.starts_with("https://")
}

/// Replaces `:name` tokens with matched parameter values
///
/// Unknown tokens (including port numbers such as `:8080`) are left untouched.
/// With `encode`, each path segment of a value is percent-encoded.
///
/// ```
/// use folio_router::rule::substitute;
/// use folio_router::{ParamValue, Params};
///
/// let mut params = Params::new();
/// params.insert("slug".into(), ParamValue::from("intro"));
/// assert_eq!(substitute("/articles/:slug", &params, true), "/articles/intro");
/// ```
pub fn substitute(template: &str, params: &Params, encode: bool) -> String {
    PARAM_TOKEN
        .replace_all(template, |caps: &Captures| match params.get(&caps[1]) {
            Some(value) => {
                let raw = value.to_path_string();
                if encode {
                    raw.split('/')
                        .map(|s| urlencoding::encode(s).into_owned())
                        .collect::<Vec<_>>()
                        .join("/")
                } else {
                    raw
                }
            }
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Names of the `:name` tokens used by a destination
pub(crate) fn referenced_params(destination: &str) -> Vec<String> {
    PARAM_TOKEN
        .captures_iter(destination)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Splits `path?query` and decodes the query pairs
pub(crate) fn split_destination(destination: &str) -> (String, Query) {
    match destination.split_once('?') {
        Some((path, query)) => (path.to_string(), parse_query(query)),
        None => (destination.to_string(), Query::new()),
    }
}

/// Parses an `a=1&b=2` query string
pub fn parse_query(query: &str) -> Query {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(k), decode_component(v))
        })
        .collect()
}

/// Serializes query pairs back to `a=1&b=2`
pub fn format_query(query: &Query) -> String {
    query
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|v| v.into_owned())
        .unwrap_or(spaced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ParamValue;

    #[test]
    fn test_redirect_status() {
        assert_eq!(RedirectRule::new("/a", "/b", 301).status().unwrap(), 301);

        let mut rule = RedirectRule::new("/a", "/b", 200);
        assert!(rule.status().is_err());

        rule.status_code = None;
        rule.permanent = Some(true);
        assert_eq!(rule.status().unwrap(), 308);

        rule.permanent = Some(false);
        assert_eq!(rule.status().unwrap(), 307);
    }

    #[test]
    fn test_substitute_catch_all_and_unknown_tokens() {
        let mut params = Params::new();
        params.insert("path".into(), ParamValue::from(vec!["a b", "c"]));
        assert_eq!(
            substitute("https://cdn.example.com:8080/:path*", &params, true),
            "https://cdn.example.com:8080/a%20b/c"
        );
    }

    #[test]
    fn test_query_round_trip() {
        let query = parse_query("b=2&a=hello+world&flag");
        assert_eq!(query.get("a").map(String::as_str), Some("hello world"));
        assert_eq!(query.get("flag").map(String::as_str), Some(""));
        assert_eq!(format_query(&query), "a=hello%20world&b=2&flag=");
    }

    #[test]
    fn test_redirect_rule_serde() {
        let rule: RedirectRule =
            serde_json::from_str(r#"{"source":"/old","destination":"/new","statusCode":301}"#)
                .unwrap();
        assert_eq!(rule, RedirectRule::new("/old", "/new", 301));
    }
}

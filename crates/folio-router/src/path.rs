/// Path utilities for request-path normalization and cache keys
///
/// All functions are **pure**: given same input, always produce same output with no side effects.
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use std::borrow::Cow;

/// Bytes escaped inside one path segment
///
/// The characters a browser escapes in a path, plus `/` and `\` (a value
/// never spans segments) and `%` (so a literal percent survives decoding).
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Escapes a decoded value for use as a single path segment
///
/// ```
/// use folio_router::path::encode_segment;
///
/// assert_eq!(encode_segment("hello,world"), "hello,world");
/// assert_eq!(encode_segment("a b/c"), "a%20b%2Fc");
/// assert_eq!(encode_segment("100%"), "100%25");
/// ```
pub fn encode_segment(value: &str) -> String {
    utf8_percent_encode(value, SEGMENT).to_string()
}

/// Decodes one path segment; invalid escapes are kept as they are
pub fn decode_segment(raw: &str) -> String {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|v| v.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

/// Checks whether a path is already in canonical form
///
/// # Rules
///
/// - Must start with `/`
/// - Must not contain `//` or `\`
/// - Must not end with `/` (except root `/`)
///
/// ```
/// use folio_router::path::is_valid_path;
///
/// assert!(is_valid_path("/"));
/// assert!(is_valid_path("/users/123"));
/// assert!(!is_valid_path("about"));
/// assert!(!is_valid_path("/about/"));
/// assert!(!is_valid_path("/about//page"));
/// ```
pub fn is_valid_path(path: &str) -> bool {
    if path.is_empty() || !path.starts_with('/') {
        return false;
    }

    if path.contains("//") || path.contains('\\') {
        return false;
    }

    path == "/" || !path.ends_with('/')
}

/// Normalizes a request path to canonical form
///
/// Returns `Cow::Borrowed` when the input is already canonical.
///
/// - Trailing slashes: `/path/` → `/path`
/// - Repeated slashes: `/path//to` → `/path/to`
/// - Backslashes: `\path\to` → `/path/to`
pub fn normalize_path(path: &str) -> Cow<'_, str> {
    if is_valid_path(path) {
        return Cow::Borrowed(path);
    }

    let normalized = path
        .replace('\\', "/")
        .split('/')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/");

    if normalized.is_empty() {
        Cow::Borrowed("/")
    } else {
        Cow::Owned(format!("/{}", normalized))
    }
}

/// Normalized cache key for a concrete page path
///
/// `/index` and `/` share one entry, as do `/a/` and `/a`. Segments are
/// decoded and re-escaped, so `/blog/hello%2Cworld` and `/blog/hello,world`
/// are the same key.
///
/// ```
/// use folio_router::path::cache_key;
///
/// assert_eq!(cache_key("/index"), "/");
/// assert_eq!(cache_key("/blog/a/"), "/blog/a");
/// assert_eq!(cache_key("/blog/c%2B%2B"), "/blog/c++");
/// ```
pub fn cache_key(path: &str) -> String {
    let normalized = normalize_path(path);
    if normalized == "/" || normalized == "/index" {
        return "/".to_string();
    }

    normalized
        .split('/')
        .map(|segment| encode_segment(&decode_segment(segment)))
        .collect::<Vec<_>>()
        .join("/")
}

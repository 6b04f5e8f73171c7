/// Route pattern compilation
///
/// Turns a template such as `/blog/[post]/[...comments]` into a [`RoutePattern`]:
/// ordered segments, the parameter names they bind, and a compiled regular
/// expression. Compilation is the only fallible step; matching and
/// interpolation are pure.
use regex::Regex;
use std::fmt;

use super::pattern::{classify_rule_segment, classify_segment, Segment};
use crate::error::{Result, RouteError};
use crate::params::{ParamValue, Params};
use crate::path::{decode_segment, encode_segment};

/// A compiled route matcher
#[derive(Debug, Clone)]
pub struct RoutePattern {
    source: String,
    segments: Vec<Segment>,
    matcher: Regex,
}

#[derive(Clone, Copy)]
enum Syntax {
    Page,
    Rule,
}

impl RoutePattern {
    /// Compiles a page template (`/users/[id]`, `/docs/[[...slug]]`)
    ///
    /// # Examples
    ///
    /// ```
    /// use folio_router::RoutePattern;
    ///
    /// let pattern = RoutePattern::compile("/blog/[post]").unwrap();
    /// let params = pattern.match_path("/blog/hello").unwrap();
    /// assert_eq!(params["post"].as_single(), Some("hello"));
    /// assert!(pattern.match_path("/blog").is_none());
    /// ```
    pub fn compile(template: &str) -> Result<Self> {
        Self::build(template, Syntax::Page)
    }

    /// Compiles a rule source (`/docs/:slug`, `/:path*`)
    pub fn compile_rule(source: &str) -> Result<Self> {
        Self::build(source, Syntax::Rule)
    }

    fn build(source: &str, syntax: Syntax) -> Result<Self> {
        let fail = |reason: String| match syntax {
            Syntax::Page => RouteError::malformed(source, reason),
            Syntax::Rule => RouteError::invalid_rule(source, reason),
        };

        if !source.starts_with('/') {
            return Err(fail("must start with `/`".to_string()));
        }

        let segments = source
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|segment| match syntax {
                Syntax::Page => classify_segment(source, segment),
                Syntax::Rule => classify_rule_segment(source, segment),
            })
            .collect::<Result<Vec<_>>>()?;

        let mut seen: Vec<&str> = Vec::new();
        for (idx, segment) in segments.iter().enumerate() {
            if segment.is_repeat() && idx + 1 != segments.len() {
                return Err(fail(format!(
                    "catch-all parameter `{}` must be the last segment",
                    segment.param_name().unwrap_or_default()
                )));
            }
            if let Some(name) = segment.param_name() {
                if seen.contains(&name) {
                    return Err(fail(format!("duplicate parameter name `{}`", name)));
                }
                seen.push(name);
            }
        }

        let matcher = Regex::new(&regex_source(&segments))
            .map_err(|e| fail(format!("cannot compile matcher: {}", e)))?;

        Ok(Self {
            source: source.to_string(),
            segments,
            matcher,
        })
    }

    /// A pattern made of literal segments only, bypassing template syntax
    ///
    /// Used for static files whose names may contain brackets.
    pub fn literal(path: &str) -> Result<Self> {
        let segments: Vec<Segment> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| Segment::Static(s.to_string()))
            .collect();
        let matcher = Regex::new(&regex_source(&segments))
            .map_err(|e| RouteError::malformed(path, e.to_string()))?;

        Ok(Self {
            source: path.to_string(),
            segments,
            matcher,
        })
    }

    /// The template this pattern was compiled from
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Parameter names in segment order
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(Segment::param_name)
    }

    /// Whether any segment is a parameter
    pub fn is_dynamic(&self) -> bool {
        self.segments.iter().any(|s| !s.is_static())
    }

    pub fn has_repeat(&self) -> bool {
        self.segments.last().is_some_and(Segment::is_repeat)
    }

    /// Number of literal segments before the first parameter
    pub fn leading_literals(&self) -> usize {
        self.segments.iter().take_while(|s| s.is_static()).count()
    }

    /// The compiled regular expression, as written to manifests
    pub fn regex_source(&self) -> &str {
        self.matcher.as_str()
    }

    /// Matches a concrete URL path, returning the bound parameters
    ///
    /// Parameter values are percent-decoded. Catch-all parameters yield
    /// [`ParamValue::Multi`]; an optional catch-all matching zero segments is
    /// left out of the result.
    pub fn match_path(&self, path: &str) -> Option<Params> {
        let captures = self.matcher.captures(path)?;
        let mut params = Params::new();

        for (idx, segment) in self.segments.iter().filter(|s| !s.is_static()).enumerate() {
            let Some(raw) = captures.get(idx + 1).map(|m| m.as_str()) else {
                continue;
            };
            let name = segment.param_name().unwrap_or_default().to_string();
            let value = if segment.is_repeat() {
                ParamValue::Multi(raw.split('/').filter(|s| !s.is_empty()).map(decode_segment).collect())
            } else {
                ParamValue::Single(decode_segment(raw))
            };
            params.insert(name, value);
        }

        Some(params)
    }

    /// Builds the concrete path for a set of parameter values (inverse of [`match_path`])
    ///
    /// Returns `None` when a required parameter is missing or has the wrong shape.
    ///
    /// ```
    /// use folio_router::{ParamValue, Params, RoutePattern};
    ///
    /// let pattern = RoutePattern::compile("/docs/[...slug]").unwrap();
    /// let mut params = Params::new();
    /// params.insert("slug".into(), ParamValue::from(vec!["guide", "intro"]));
    /// assert_eq!(pattern.interpolate(&params).as_deref(), Some("/docs/guide/intro"));
    /// ```
    ///
    /// [`match_path`]: RoutePattern::match_path
    pub fn interpolate(&self, params: &Params) -> Option<String> {
        let mut parts: Vec<String> = Vec::with_capacity(self.segments.len());

        for segment in &self.segments {
            match segment {
                Segment::Static(literal) => parts.push(literal.clone()),
                Segment::Dynamic(name) => match params.get(name)? {
                    ParamValue::Single(v) if !v.is_empty() => parts.push(encode_segment(v)),
                    ParamValue::Multi(vs) if vs.len() == 1 && !vs[0].is_empty() => {
                        parts.push(encode_segment(&vs[0]))
                    }
                    _ => return None,
                },
                Segment::CatchAll(name) => {
                    let values = repeat_values(params.get(name)?);
                    if values.is_empty() {
                        return None;
                    }
                    parts.extend(values);
                }
                Segment::OptionalCatchAll(name) => {
                    if let Some(value) = params.get(name) {
                        parts.extend(repeat_values(value));
                    }
                }
            }
        }

        Some(format!("/{}", parts.join("/")))
    }
}

impl PartialEq for RoutePattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for RoutePattern {}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Builds the anchored regex for a segment list
pub(crate) fn regex_source(segments: &[Segment]) -> String {
    if segments.is_empty() {
        return "^/?$".to_string();
    }

    let mut re = String::from("^");
    re.push_str(&segments_regex(segments));
    re.push_str("(?:/)?$");
    re
}

/// Regex body for a segment list, without anchors
pub(crate) fn segments_regex(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|segment| match segment {
            Segment::Static(literal) => format!("/{}", regex::escape(literal)),
            Segment::Dynamic(_) => "/([^/]+?)".to_string(),
            Segment::CatchAll(_) => "/(.+?)".to_string(),
            Segment::OptionalCatchAll(_) => "(?:/(.+?))?".to_string(),
        })
        .collect()
}

fn repeat_values(value: &ParamValue) -> Vec<String> {
    match value {
        ParamValue::Single(v) => v.split('/').filter(|s| !s.is_empty()).map(encode_segment).collect(),
        ParamValue::Multi(vs) => vs.iter().filter(|s| !s.is_empty()).map(|s| encode_segment(s)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_static() {
        let pattern = RoutePattern::compile("/about").unwrap();
        assert!(!pattern.is_dynamic());
        assert_eq!(pattern.leading_literals(), 1);
        assert!(pattern.match_path("/about").is_some());
        assert!(pattern.match_path("/about/").is_some());
        assert!(pattern.match_path("/About").is_none());
    }

    #[test]
    fn test_compile_root() {
        let pattern = RoutePattern::compile("/").unwrap();
        assert!(pattern.match_path("/").is_some());
        assert!(pattern.match_path("/a").is_none());
        assert_eq!(pattern.interpolate(&Params::new()).as_deref(), Some("/"));
    }

    #[test]
    fn test_requires_leading_slash() {
        assert!(matches!(
            RoutePattern::compile("blog/[post]"),
            Err(RouteError::MalformedRoute { .. })
        ));
    }

    #[test]
    fn test_duplicate_param_rejected() {
        let err = RoutePattern::compile("/[id]/posts/[id]").unwrap_err();
        assert!(matches!(err, RouteError::MalformedRoute { ref reason, .. } if reason.contains("duplicate")));
    }

    #[test]
    fn test_non_terminal_catch_all_rejected() {
        let err = RoutePattern::compile("/docs/[...slug]/edit").unwrap_err();
        assert!(matches!(err, RouteError::MalformedRoute { ref reason, .. } if reason.contains("last segment")));
    }

    #[test]
    fn test_rule_errors_are_rule_errors() {
        let err = RoutePattern::compile_rule("/:a/:a").unwrap_err();
        assert!(matches!(err, RouteError::InvalidRule { .. }));
    }

    #[test]
    fn test_catch_all_requires_one_segment() {
        let pattern = RoutePattern::compile("/docs/[...slug]").unwrap();
        assert!(pattern.match_path("/docs").is_none());
        let params = pattern.match_path("/docs/a/b").unwrap();
        assert_eq!(params["slug"], ParamValue::from(vec!["a", "b"]));
    }

    #[test]
    fn test_optional_catch_all_matches_zero_segments() {
        let pattern = RoutePattern::compile("/docs/[[...slug]]").unwrap();
        let params = pattern.match_path("/docs").unwrap();
        assert!(params.get("slug").is_none());
        let params = pattern.match_path("/docs/x").unwrap();
        assert_eq!(params["slug"], ParamValue::from(vec!["x"]));
    }

    #[test]
    fn test_values_are_decoded_and_encoded() {
        let pattern = RoutePattern::compile("/tags/[tag]").unwrap();
        let params = pattern.match_path("/tags/a%20b").unwrap();
        assert_eq!(params["tag"].as_single(), Some("a b"));
        assert_eq!(pattern.interpolate(&params).as_deref(), Some("/tags/a%20b"));
    }

    #[test]
    fn test_interpolate_keeps_sub_delimiters() {
        let pattern = RoutePattern::compile("/blog/[post]").unwrap();
        for post in ["hello,world", "c++", "12:30"] {
            let mut params = Params::new();
            params.insert("post".into(), ParamValue::from(post));
            let path = pattern.interpolate(&params).unwrap();
            assert_eq!(path, format!("/blog/{}", post));
            assert_eq!(pattern.match_path(&path).unwrap()["post"].as_single(), Some(post));
        }
    }

    #[test]
    fn test_interpolate_missing_param() {
        let pattern = RoutePattern::compile("/blog/[post]").unwrap();
        assert!(pattern.interpolate(&Params::new()).is_none());
    }

    #[test]
    fn test_regex_source_escapes_literals() {
        let pattern = RoutePattern::compile("/a.b/[id]").unwrap();
        assert_eq!(pattern.regex_source(), r"^/a\.b/([^/]+?)(?:/)?$");
    }
}

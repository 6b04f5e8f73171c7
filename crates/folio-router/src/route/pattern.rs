/// Segment classification for route templates
///
/// Pure functional parsing of a single path segment into a typed [`Segment`].
/// Two surface syntaxes are understood:
///
/// - page templates: `about`, `[id]`, `[...slug]`, `[[...slug]]`
/// - rule sources: `about`, `:id`, `:slug+`, `:slug*`
use crate::error::{Result, RouteError};

/// One segment of a compiled route pattern
///
/// # Examples
///
/// ```
/// use folio_router::route::pattern::{classify_segment, Segment};
///
/// assert_eq!(classify_segment("/t", "about").unwrap(), Segment::Static("about".into()));
/// assert_eq!(classify_segment("/t", "[id]").unwrap(), Segment::Dynamic("id".into()));
/// assert_eq!(classify_segment("/t", "[...slug]").unwrap(), Segment::CatchAll("slug".into()));
/// assert_eq!(
///     classify_segment("/t", "[[...slug]]").unwrap(),
///     Segment::OptionalCatchAll("slug".into())
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal text, matched byte-for-byte
    Static(String),
    /// `[name]`: exactly one non-empty segment
    Dynamic(String),
    /// `[...name]`: one or more remaining segments
    CatchAll(String),
    /// `[[...name]]`: zero or more remaining segments
    OptionalCatchAll(String),
}

impl Segment {
    /// Parameter name, `None` for literal segments
    pub fn param_name(&self) -> Option<&str> {
        match self {
            Segment::Static(_) => None,
            Segment::Dynamic(name) | Segment::CatchAll(name) | Segment::OptionalCatchAll(name) => {
                Some(name)
            }
        }
    }

    pub fn is_static(&self) -> bool {
        matches!(self, Segment::Static(_))
    }

    /// Whether the segment consumes a variable number of path segments
    pub fn is_repeat(&self) -> bool {
        matches!(self, Segment::CatchAll(_) | Segment::OptionalCatchAll(_))
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, Segment::OptionalCatchAll(_))
    }

    /// Ordering rank used by the route sorter: literal < single < catch-all < optional catch-all
    pub(crate) fn rank(&self) -> u8 {
        match self {
            Segment::Static(_) => 0,
            Segment::Dynamic(_) => 1,
            Segment::CatchAll(_) => 2,
            Segment::OptionalCatchAll(_) => 3,
        }
    }
}

/// Classifies a page-template segment (pure function)
///
/// # Parsing Rules (evaluated in order)
///
/// 1. **Optional catch-all**: `[[...name]]`
/// 2. **Catch-all**: `[...name]`
/// 3. **Dynamic**: `[name]`
/// 4. **Static**: any text without brackets
///
/// Brackets anywhere else (`a[b]`, `[[id]]`, `[]`) are rejected with
/// [`RouteError::MalformedRoute`].
pub fn classify_segment(template: &str, segment: &str) -> Result<Segment> {
    if let Some(inner) = segment
        .strip_prefix("[[")
        .and_then(|s| s.strip_suffix("]]"))
    {
        return match inner.strip_prefix("...") {
            Some(name) => Ok(Segment::OptionalCatchAll(param_name(template, name)?)),
            None => Err(RouteError::malformed(
                template,
                format!("optional segment `{}` must be a catch-all ([[...name]])", segment),
            )),
        };
    }

    match segment.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        Some(inner) => match inner.strip_prefix("...") {
            Some(name) => Ok(Segment::CatchAll(param_name(template, name)?)),
            None => Ok(Segment::Dynamic(param_name(template, inner)?)),
        },
        None if segment.contains('[') || segment.contains(']') => Err(RouteError::malformed(
            template,
            format!("segment `{}` mixes literal text and a parameter", segment),
        )),
        None => Ok(Segment::Static(segment.to_string())),
    }
}

/// Classifies a rule-source segment written in `:name` syntax
///
/// ```
/// use folio_router::route::pattern::{classify_rule_segment, Segment};
///
/// assert_eq!(classify_rule_segment("/d/:slug", ":slug").unwrap(), Segment::Dynamic("slug".into()));
/// assert_eq!(classify_rule_segment("/d/:p+", ":p+").unwrap(), Segment::CatchAll("p".into()));
/// assert_eq!(classify_rule_segment("/d/:p*", ":p*").unwrap(), Segment::OptionalCatchAll("p".into()));
/// ```
///
/// Bracket segments are accepted too, so a rule source may be written like a page template.
pub fn classify_rule_segment(source: &str, segment: &str) -> Result<Segment> {
    let Some(param) = segment.strip_prefix(':') else {
        return classify_segment(source, segment).map_err(|e| match e {
            RouteError::MalformedRoute { reason, .. } => RouteError::invalid_rule(source, reason),
            other => other,
        });
    };

    let (name, segment) = if let Some(name) = param.strip_suffix('*') {
        (name, Segment::OptionalCatchAll(name.to_string()))
    } else if let Some(name) = param.strip_suffix('+') {
        (name, Segment::CatchAll(name.to_string()))
    } else {
        (param, Segment::Dynamic(param.to_string()))
    };

    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(RouteError::invalid_rule(
            source,
            format!("invalid parameter name `{}`", name),
        ));
    }

    Ok(segment)
}

fn param_name(template: &str, name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(RouteError::malformed(template, "empty parameter name"));
    }
    if name.contains(['[', ']', '/']) || name.starts_with('.') {
        return Err(RouteError::malformed(
            template,
            format!("invalid parameter name `{}`", name),
        ));
    }
    Ok(name.to_string())
}

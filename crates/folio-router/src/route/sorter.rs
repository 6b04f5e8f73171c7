/// Deterministic ordering of dynamic routes
///
/// Matching walks dynamic routes in order and stops at the first hit, so the
/// order decides which page wins when several patterns accept a path.
use std::cmp::Ordering;

use super::parser::RoutePattern;

/// Compares two patterns for matching priority (`Less` = tried first)
///
/// # Ordering
///
/// 1. More literal leading segments first
/// 2. Non-repeat routes before catch-all routes
/// 3. Required catch-all before optional catch-all
/// 4. Segment by segment: literal < `[x]` < `[...x]` < `[[...x]]`
/// 5. Template string
///
/// The string tiebreak makes this a total order over distinct templates, so
/// sorting is stable and idempotent regardless of registration order.
///
/// ```
/// use folio_router::route::sorter::compare_patterns;
/// use folio_router::RoutePattern;
/// use std::cmp::Ordering;
///
/// let specific = RoutePattern::compile("/blog/[post]").unwrap();
/// let catch_all = RoutePattern::compile("/[...slug]").unwrap();
/// assert_eq!(compare_patterns(&specific, &catch_all), Ordering::Less);
/// ```
pub fn compare_patterns(a: &RoutePattern, b: &RoutePattern) -> Ordering {
    b.leading_literals()
        .cmp(&a.leading_literals())
        .then_with(|| a.has_repeat().cmp(&b.has_repeat()))
        .then_with(|| optional_repeat(a).cmp(&optional_repeat(b)))
        .then_with(|| {
            a.segments()
                .iter()
                .map(|s| s.rank())
                .cmp(b.segments().iter().map(|s| s.rank()))
        })
        .then_with(|| a.source().cmp(b.source()))
}

/// Sorts items carrying a pattern into matching order
pub fn sort_by_pattern<T>(items: &mut [T], pattern: impl Fn(&T) -> &RoutePattern) {
    items.sort_by(|a, b| compare_patterns(pattern(a), pattern(b)));
}

fn optional_repeat(pattern: &RoutePattern) -> bool {
    pattern.segments().last().is_some_and(|s| s.is_optional())
}

/// Route module: pattern compilation, segment classification and ordering
///
/// Contains pure functional components:
/// - `pattern` classifies single segments
/// - `parser` compiles whole templates into matchers
/// - `sorter` orders dynamic routes for first-match-wins lookup
pub mod parser;
pub mod pattern;
pub mod sorter;

pub use parser::RoutePattern;
pub use pattern::Segment;
pub use sorter::{compare_patterns, sort_by_pattern};

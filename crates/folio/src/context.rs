// File: src/context.rs
// Purpose: Per-request render context and the output of a component render

use folio_router::{PageMatch, Params, Query};

/// Everything a page needs to know about the request being rendered
///
/// Built once per render and never mutated. Anything a render produces
/// besides markup (head tags) comes back in [`RenderOutput`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderContext {
    /// Page template (`/blog/[post]`)
    pub page: String,
    /// Concrete path being rendered (`/blog/hello`)
    pub path: String,
    pub params: Params,
    pub query: Query,
    pub build_id: String,
    /// Rendering the placeholder for a path that has not been generated yet
    pub is_fallback: bool,
    pub preview: bool,
    pub dev: bool,
}

impl RenderContext {
    pub fn new(page: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            page: page.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    /// Context for a page resolved by the router, carrying the full request query
    pub fn from_match(page: &PageMatch, build_id: &str) -> Self {
        Self {
            page: page.page.clone(),
            path: page.path.clone(),
            params: page.params.clone(),
            query: page.query.clone(),
            build_id: build_id.to_string(),
            ..Default::default()
        }
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    pub fn with_query(mut self, query: Query) -> Self {
        self.query = query;
        self
    }

    pub fn with_build_id(mut self, build_id: impl Into<String>) -> Self {
        self.build_id = build_id.into();
        self
    }

    pub fn with_fallback(mut self, is_fallback: bool) -> Self {
        self.is_fallback = is_fallback;
        self
    }

    pub fn with_preview(mut self, preview: bool) -> Self {
        self.preview = preview;
        self
    }

    pub fn with_dev(mut self, dev: bool) -> Self {
        self.dev = dev;
        self
    }

    /// Single-segment parameter value
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(|v| v.as_single())
    }
}

/// Result of rendering a page component
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderOutput {
    /// Body markup
    pub body: String,
    /// Tags collected for the document head, in render order
    pub head: Vec<String>,
}

impl RenderOutput {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            head: Vec::new(),
        }
    }

    pub fn with_head(mut self, tag: impl Into<String>) -> Self {
        self.head.push(tag.into());
        self
    }
}

impl From<maud::Markup> for RenderOutput {
    fn from(markup: maud::Markup) -> Self {
        Self::new(markup.into_string())
    }
}

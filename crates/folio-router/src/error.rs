use thiserror::Error;

/// Errors raised while compiling routes or loading routing configuration.
///
/// All of these surface at registration time; request-time matching never fails.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RouteError {
    #[error("malformed route `{template}`: {reason}")]
    MalformedRoute { template: String, reason: String },

    #[error("invalid rule `{rule}`: {reason}")]
    InvalidRule { rule: String, reason: String },

    #[error("routes manifest error: {0}")]
    Manifest(String),
}

impl RouteError {
    pub(crate) fn malformed(template: &str, reason: impl Into<String>) -> Self {
        RouteError::MalformedRoute {
            template: template.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_rule(source: &str, reason: impl Into<String>) -> Self {
        RouteError::InvalidRule {
            rule: source.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RouteError>;

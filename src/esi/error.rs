//! ESI processing errors.

use std::fmt;

use http::StatusCode;

use super::markup::MarkupError;

/// Errors that abort ESI processing of a request.
///
/// All of them are fatal for the top-level request: nothing is retried and
/// no partially assembled document is ever returned.
#[derive(Debug)]
pub enum EsiError {
    /// Include nesting went past the configured maximum.
    DepthExceeded { depth: usize, max_depth: usize },

    /// An `esi:include` without a `src` attribute.
    MissingSource,

    /// An `esi:include` whose `src` is not an absolute same-origin path.
    NonAbsoluteSource { src: String },

    /// A nested fetch answered with something other than 200.
    IncludeFailed { src: String, status: StatusCode },

    /// The response body could not be parsed as markup.
    Markup(MarkupError),

    /// The inner handler failed; passed through untranslated.
    Handler(crate::core::Error),
}

impl EsiError {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            EsiError::DepthExceeded { .. } => "depth_exceeded",
            EsiError::MissingSource => "missing_source",
            EsiError::NonAbsoluteSource { .. } => "non_absolute_source",
            EsiError::IncludeFailed { .. } => "include_failed",
            EsiError::Markup(_) => "markup",
            EsiError::Handler(_) => "handler",
        }
    }

    /// Status a host should answer with when it turns this error into a
    /// response.
    pub fn status_code(&self) -> StatusCode {
        match self {
            EsiError::IncludeFailed { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for EsiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EsiError::DepthExceeded { depth, max_depth } => write!(
                f,
                "too many levels of ESI processing: level {} reached (max {})",
                depth, max_depth
            ),
            EsiError::MissingSource => write!(f, "esi:include without @src"),
            EsiError::NonAbsoluteSource { src } => {
                write!(f, "esi:include[@src] must be absolute ({:?} is not)", src)
            }
            EsiError::IncludeFailed { src, status } => {
                write!(f, "{} request failed (code: {})", src, status.as_u16())
            }
            EsiError::Markup(e) => write!(f, "ESI markup error: {}", e),
            EsiError::Handler(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for EsiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EsiError::Markup(e) => Some(e),
            EsiError::Handler(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MarkupError> for EsiError {
    fn from(e: MarkupError) -> Self {
        EsiError::Markup(e)
    }
}

impl From<crate::core::Error> for EsiError {
    fn from(e: crate::core::Error) -> Self {
        EsiError::Handler(e)
    }
}

/// Result type alias for ESI processing.
pub type Result<T> = std::result::Result<T, EsiError>;

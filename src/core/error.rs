//! Handler error types.

use std::fmt;

/// Errors raised by inner handlers.
///
/// The ESI processor never translates these; they reach the host unchanged
/// (wrapped in [`EsiError::Handler`](crate::esi::EsiError::Handler)).
#[derive(Debug)]
pub enum Error {
    /// I/O error.
    Io(std::io::Error),

    /// HTTP error.
    Http(http::Error),

    /// Upstream or application failure with message.
    Custom(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Http(e) => write!(f, "HTTP error: {}", e),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Http(e) => Some(e),
            Error::Custom(_) => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<http::Error> for Error {
    fn from(e: http::Error) -> Self {
        Error::Http(e)
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Custom(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Custom(msg.to_string())
    }
}

/// Result type alias for handler operations.
pub type Result<T> = std::result::Result<T, Error>;

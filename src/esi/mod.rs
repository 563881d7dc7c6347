//! Edge Side Includes processing.
//!
//! [`EsiProcessor`] wraps an inner [`Handler`](crate::handler::Handler) and
//! post-processes its markup responses:
//!
//! 1. every `esi:include` is replaced, in document order, by the body of a
//!    nested GET request for its `src` (processed recursively),
//! 2. every `esi:remove` and `esi:comment` element is dropped,
//! 3. the response is re-serialized with a fresh `Content-Length` and a
//!    private, must-revalidate cache policy.
//!
//! Responses that are not HTML/XML, or that contain no `<esi:` marker, are
//! returned exactly as the inner handler produced them.
//!
//! # Example
//!
//! ```rust,ignore
//! use tokio_esi::esi::EsiProcessor;
//! use tokio_esi::handler::StaticHandler;
//!
//! let processor = EsiProcessor::new(StaticHandler::new("/var/www/html", "index.html"));
//! let response = processor.call(&ctx).await?;
//! ```

mod directive;
mod error;
mod finalize;
mod markup;
mod processor;

pub use directive::{DirectiveKind, IncludeTarget};
pub use error::{EsiError, Result};
pub use finalize::{finalize, ASSEMBLED_CACHE_CONTROL};
pub use markup::{Document, MarkupError, NodeId};
pub use processor::EsiProcessor;

/// Default include nesting limit.
pub const DEFAULT_MAX_DEPTH: usize = 5;

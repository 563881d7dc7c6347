//! Core types shared by handlers and the ESI processor.
//!
//! - [`RequestContext`] - request attributes handed to a handler
//! - [`Response`] - status, headers and chunked [`Body`]
//! - [`Error`] - errors raised by handlers
//!
//! # Example
//!
//! ```rust,ignore
//! use tokio_esi::core::{RequestContext, Response};
//!
//! let ctx = RequestContext::builder("localhost", 8080)
//!     .path_info("/index.html")
//!     .build();
//!
//! let res = Response::builder().html().body("<p>hi</p>").build();
//! ```

mod context;
mod error;
mod response;
pub mod time;

pub use context::{generate_request_id, ContextBuilder, RequestContext};
pub use error::{Error, Result};
pub use response::{Body, Response, ResponseBuilder};

//! tokio_esi - Edge Side Includes processing for async Rust HTTP stacks.
//!
//! This crate wraps an inner request handler and assembles its HTML/XML
//! responses from ESI directives before they leave the server.
//!
//! # Features
//!
//! - **`esi:include`**: same-origin fragments fetched through the inner
//!   handler, recursively, with a bounded nesting depth
//! - **`esi:remove` / `esi:comment`**: stripped from assembled output
//! - **Byte-exact passthrough**: non-markup responses and markup without
//!   directives are returned untouched
//! - **Static file handler**: a ready-made inner handler for a document root
//! - **Observability**: structured logging via tracing, Prometheus metrics
//!
//! # Architecture
//!
//! ```text
//! client ──► Server ──► EsiProcessor ──► Handler (StaticHandler, ...)
//!                          │   ▲
//!                          └───┘  one nested GET per esi:include
//! ```
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

/// Package version from Cargo.toml
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Git commit hash (8 chars) or the BUILD_VERSION override, empty if neither is known
pub const BUILD_VERSION: &str = env!("BUILD_VERSION");

/// Full version string: "0.1.0 (abc12345)"
pub const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BUILD_VERSION"), ")");

pub mod config;
pub mod core;
pub mod esi;
pub mod handler;
pub mod logging;
pub mod observability;
pub mod server;

// Re-exports for convenience
pub use config::Config;
pub use esi::{EsiError, EsiProcessor};
pub use server::Server;

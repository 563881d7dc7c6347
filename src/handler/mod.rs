//! Inner request handlers.
//!
//! The ESI processor wraps a [`Handler`] and re-invokes it for every
//! `esi:include` it finds, so implementations must be safe to call
//! repeatedly with synthetic GET requests derived from the original one.
//!
//! | Handler | Description |
//! |---------|-------------|
//! | [`StaticHandler`] | Serves files below a document root |
//! | [`FnHandler`] | Adapts an async closure, handy for embedding and tests |
//!
//! # Example
//!
//! ```rust,ignore
//! use tokio_esi::handler::{Handler, StaticHandler};
//!
//! let handler = StaticHandler::new("/var/www/html", "index.html");
//! let response = handler.handle(&ctx).await?;
//! ```

mod static_files;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

pub use static_files::StaticHandler;

use crate::core::{RequestContext, Response, Result};

/// Trait for inner request handlers.
///
/// Implementations must be thread-safe: a single handler instance serves
/// every connection and every nested include.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Produce the response for `ctx`.
    ///
    /// Errors are propagated to the host unchanged.
    async fn handle(&self, ctx: &RequestContext) -> Result<Response>;

    /// Returns the name of this handler for logging purposes.
    fn name(&self) -> &'static str;
}

#[async_trait]
impl<H: Handler + ?Sized> Handler for Arc<H> {
    #[inline]
    async fn handle(&self, ctx: &RequestContext) -> Result<Response> {
        (**self).handle(ctx).await
    }

    #[inline]
    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Handler backed by a closure returning a future.
///
/// The closure receives an owned copy of the context so the returned
/// future can be `'static`.
pub struct FnHandler<F> {
    name: &'static str,
    f: F,
}

impl<F, Fut> FnHandler<F>
where
    F: Fn(RequestContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response>> + Send,
{
    pub fn new(name: &'static str, f: F) -> Self {
        Self { name, f }
    }
}

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(RequestContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response>> + Send,
{
    async fn handle(&self, ctx: &RequestContext) -> Result<Response> {
        (self.f)(ctx.clone()).await
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

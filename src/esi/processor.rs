//! The ESI processor: include resolution around an inner handler.

use std::sync::{Arc, LazyLock};
use std::time::Instant;

use futures_util::future::{BoxFuture, FutureExt};
use http::StatusCode;
use regex::Regex;
use tracing::{debug, warn};

use super::directive::{DirectiveKind, IncludeTarget};
use super::error::{EsiError, Result};
use super::finalize::finalize;
use super::markup::Document;
use super::DEFAULT_MAX_DEPTH;
use crate::config::EsiConfig;
use crate::core::{RequestContext, Response};
use crate::handler::Handler;
use crate::observability::Metrics;

/// Content types eligible for processing.
static MARKUP_CONTENT_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^text/(?:ht|x)ml").expect("Invalid regex"));

/// Cheap pre-parse check for directives.
const ESI_MARKER: &[u8] = b"<esi:";

/// What a processing pass did with a response.
enum Outcome {
    /// Returned exactly as the handler produced it.
    Passthrough(Response),
    /// Directives were resolved and the response re-serialized.
    Assembled(Response),
}

impl Outcome {
    fn into_response(self) -> Response {
        match self {
            Outcome::Passthrough(res) | Outcome::Assembled(res) => res,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Outcome::Passthrough(_) => "passthrough",
            Outcome::Assembled(_) => "assembled",
        }
    }
}

/// Wraps an inner [`Handler`] and resolves ESI directives in its markup
/// responses.
///
/// The processor is immutable after construction and can be shared between
/// connections behind an `Arc`.
pub struct EsiProcessor<H> {
    handler: H,
    max_depth: usize,
    metrics: Option<Arc<Metrics>>,
}

impl<H: Handler> EsiProcessor<H> {
    /// Create a processor with the default nesting limit.
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            max_depth: DEFAULT_MAX_DEPTH,
            metrics: None,
        }
    }

    /// Create a processor from configuration.
    pub fn from_config(handler: H, config: &EsiConfig) -> Self {
        Self::new(handler).with_max_depth(config.max_depth)
    }

    /// Set the maximum include nesting depth.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Record document, include and error metrics.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    #[inline]
    pub fn handler(&self) -> &H {
        &self.handler
    }

    #[inline]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Process a top-level request.
    ///
    /// Any error aborts the whole request; the caller decides how to
    /// render it (see [`EsiError::status_code`]).
    pub async fn call(&self, ctx: &RequestContext) -> Result<Response> {
        let started = Instant::now();
        let result = self.run(ctx, 0).await;

        if let Some(metrics) = &self.metrics {
            metrics.observe_processing(started.elapsed().as_secs_f64());
            match &result {
                Ok(outcome) => metrics.record_document(outcome.label()),
                Err(e) => {
                    metrics.record_document("failed");
                    metrics.record_error(e.kind());
                }
            }
        }

        match result {
            Ok(outcome) => Ok(outcome.into_response()),
            Err(e) => {
                warn!(
                    request_id = %ctx.request_id,
                    path = %ctx.path(),
                    kind = e.kind(),
                    error = %e,
                    "ESI processing failed"
                );
                Err(e)
            }
        }
    }

    /// Process `ctx` at include nesting level `depth`.
    ///
    /// Level 0 is the top-level request. Fails with
    /// [`EsiError::DepthExceeded`] before the handler is invoked when
    /// `depth` exceeds the configured maximum.
    pub fn process<'a>(
        &'a self,
        ctx: &'a RequestContext,
        depth: usize,
    ) -> BoxFuture<'a, Result<Response>> {
        async move { self.run(ctx, depth).await.map(Outcome::into_response) }.boxed()
    }

    fn run<'a>(&'a self, ctx: &'a RequestContext, depth: usize) -> BoxFuture<'a, Result<Outcome>> {
        async move {
            if depth > self.max_depth {
                return Err(EsiError::DepthExceeded {
                    depth,
                    max_depth: self.max_depth,
                });
            }

            let response = self.handler.handle(ctx).await?;

            let is_markup = response
                .content_type()
                .is_some_and(|ct| MARKUP_CONTENT_TYPE.is_match(ct));
            if !is_markup {
                debug!(path = %ctx.path(), depth, "Not markup, passing through");
                return Ok(Outcome::Passthrough(response));
            }

            let source = response.body().concat();
            if !contains(&source, ESI_MARKER) {
                debug!(path = %ctx.path(), depth, "No ESI markup, passing through");
                return Ok(Outcome::Passthrough(response));
            }

            let mut doc = Document::parse(source)?;
            self.resolve(&mut doc, ctx, depth).await?;

            let (status, headers, _) = response.into_parts();
            Ok(Outcome::Assembled(finalize(status, headers, doc)))
        }
        .boxed()
    }

    /// Resolve includes in document order, then purge removes and comments.
    async fn resolve(&self, doc: &mut Document, ctx: &RequestContext, depth: usize) -> Result<()> {
        for id in doc.find(DirectiveKind::Include) {
            if !doc.is_attached(id) {
                continue;
            }

            let src = doc.include_src(id).ok_or(EsiError::MissingSource)?;
            let target = IncludeTarget::parse(src, ctx)?;
            let include_ctx = ctx.derive_include(&target);

            debug!(
                request_id = %ctx.request_id,
                src = %target.src(),
                depth = depth + 1,
                "Dispatching ESI include"
            );

            let response = self.process(&include_ctx, depth + 1).await?;
            if let Some(metrics) = &self.metrics {
                metrics.record_include(response.status().as_u16());
            }

            if response.status() != StatusCode::OK {
                return Err(EsiError::IncludeFailed {
                    src: target.src().to_string(),
                    status: response.status(),
                });
            }

            doc.replace_with_text(id, response.body().concat());
        }

        for kind in [DirectiveKind::Remove, DirectiveKind::Comment] {
            for id in doc.find(kind) {
                if doc.is_attached(id) {
                    doc.remove(id);
                }
            }
        }

        Ok(())
    }
}

#[inline]
fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

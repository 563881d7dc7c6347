//! Per-connection request handling.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use http::{header, Method};
use http_body_util::{BodyExt, Full};
use hyper::body::{Body as _, Incoming as IncomingBody};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tracing::debug;

use crate::core::RequestContext;
use crate::esi::{EsiError, EsiProcessor};
use crate::handler::Handler;
use crate::logging::{log_access, AccessEntry};
use crate::observability::Metrics;

/// Shared state for all connections of a server.
pub struct ConnectionContext<H> {
    /// ESI processor wrapping the inner handler.
    pub processor: Arc<EsiProcessor<H>>,
    /// Prometheus metrics.
    pub metrics: Arc<Metrics>,
    /// Active connections counter.
    pub active_connections: Arc<AtomicUsize>,
    /// Configured server name (SERVER_NAME).
    pub server_name: Option<String>,
    /// Local listen address.
    pub local_addr: SocketAddr,
    /// Access logging enabled (ACCESS_LOG=1).
    pub access_log_enabled: bool,
}

impl<H: Handler + 'static> ConnectionContext<H> {
    /// Serve one TCP connection until it closes or shutdown is signalled.
    ///
    /// On shutdown the connection finishes its in-flight request and is then
    /// closed.
    pub async fn handle_connection(
        self: Arc<Self>,
        stream: TcpStream,
        remote_addr: SocketAddr,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);

        let ctx = Arc::clone(&self);
        let service = service_fn(move |req| {
            let ctx = Arc::clone(&ctx);
            async move { ctx.handle_request(req, remote_addr).await }
        });

        let io = TokioIo::new(stream);
        let conn = http1::Builder::new()
            .keep_alive(true)
            .serve_connection(io, service);
        tokio::pin!(conn);

        let result = tokio::select! {
            result = conn.as_mut() => result,
            _ = shutdown_rx.changed() => {
                conn.as_mut().graceful_shutdown();
                conn.await
            }
        };

        if let Err(err) = result {
            if !is_connection_error(&err) {
                debug!("Connection error: {:?}", err);
            }
        }

        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    async fn handle_request(
        &self,
        req: Request<IncomingBody>,
        remote_addr: SocketAddr,
    ) -> Result<Response<Full<Bytes>>, Infallible> {
        let request_start = Instant::now();

        let (parts, body) = req.into_parts();
        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                debug!("Failed to read request body: {}", e);
                return Ok(plain_response(StatusCode::BAD_REQUEST));
            }
        };

        let (server_name, server_port) = server_identity(
            parts.headers.get(header::HOST).and_then(|v| v.to_str().ok()),
            self.server_name.as_deref(),
            self.local_addr,
        );

        let mut ctx =
            RequestContext::from_http(Request::from_parts(parts, body), server_name, server_port);
        ctx.remote_addr = Some(remote_addr.ip());

        let response = match self.processor.call(&ctx).await {
            Ok(res) => http::Response::<Bytes>::from(res).map(Full::new),
            Err(e) => error_response(&e),
        };
        let response = strip_head_body(&ctx.method, response);

        let status = response.status().as_u16();
        let elapsed = request_start.elapsed();
        let path = ctx.path();

        self.metrics.record_http_request(
            ctx.method.as_str(),
            &path,
            status,
            elapsed.as_secs_f64(),
        );

        if self.access_log_enabled {
            let bytes = response.body().size_hint().exact().unwrap_or(0);

            log_access(&AccessEntry {
                request_id: &ctx.request_id,
                ip: ctx.remote_addr,
                method: ctx.method.as_str(),
                path: &path,
                query: ctx.query(),
                status,
                bytes,
                duration_ms: elapsed.as_secs_f64() * 1000.0,
                ua: ctx.header("user-agent"),
                referer: ctx.header("referer"),
            });
        }

        Ok(response)
    }
}

/// Determine the server name and port reported to handlers.
///
/// A configured name wins over the `Host` header; without either the local
/// listen IP is used. The port comes from `Host` when it carries one, is 80
/// for a bare `Host`, and falls back to the listen port.
fn server_identity(
    host: Option<&str>,
    configured: Option<&str>,
    local_addr: SocketAddr,
) -> (String, u16) {
    let parsed = host.and_then(|h| h.parse::<http::uri::Authority>().ok());

    let port = match &parsed {
        Some(authority) => authority.port_u16().unwrap_or(80),
        None => local_addr.port(),
    };

    let name = match (configured, &parsed) {
        (Some(name), _) => name.to_string(),
        (None, Some(authority)) => authority.host().to_string(),
        (None, None) => local_addr.ip().to_string(),
    };

    (name, port)
}

/// Render a fatal ESI error.
///
/// Details stay in the log; the client only sees the status line.
fn error_response(err: &EsiError) -> Response<Full<Bytes>> {
    plain_response(err.status_code())
}

fn plain_response(status: StatusCode) -> Response<Full<Bytes>> {
    let body = format!(
        "{} {}\n",
        status.as_u16(),
        status.canonical_reason().unwrap_or("")
    );

    http::Response::<Bytes>::from(crate::core::Response::error(status, &body)).map(Full::new)
}

/// HEAD gets the headers of the equivalent GET, including the assembled
/// `Content-Length`, but no body.
fn strip_head_body(method: &Method, response: Response<Full<Bytes>>) -> Response<Full<Bytes>> {
    if *method != Method::HEAD {
        return response;
    }
    response.map(|_| Full::new(Bytes::new()))
}

/// Client-side disconnects are routine and not worth logging.
fn is_connection_error(err: &hyper::Error) -> bool {
    err.is_incomplete_message() || err.is_canceled() || err.is_closed()
}

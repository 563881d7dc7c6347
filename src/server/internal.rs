//! Internal HTTP server for health and metrics endpoints.

use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use http::header::{self, HeaderValue};
use http_body_util::Full;
use hyper::body::Incoming as IncomingBody;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{debug, error};

use crate::observability::Metrics;

/// State shared by internal endpoints.
pub struct InternalState {
    pub metrics: Arc<Metrics>,
    pub active_connections: Arc<AtomicUsize>,
    pub started_at: Instant,
}

/// `/health` response body.
#[derive(Serialize)]
struct Health<'a> {
    status: &'a str,
    version: &'a str,
    timestamp: u64,
    uptime_secs: u64,
    active_connections: usize,
}

/// Run the internal HTTP server for /health and /metrics endpoints.
pub async fn run_internal_server(
    listener: TcpListener,
    state: Arc<InternalState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    loop {
        let (stream, _) = listener.accept().await?;
        let _ = stream.set_nodelay(true);
        let state = Arc::clone(&state);

        tokio::spawn(async move {
            let service = service_fn(move |req| {
                let state = Arc::clone(&state);
                async move { handle_internal_request(req, &state) }
            });

            let io = TokioIo::new(stream);
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!("Internal connection error: {:?}", e);
            }
        });
    }
}

/// Handle internal server requests (/health, /metrics).
fn handle_internal_request(
    req: Request<IncomingBody>,
    state: &InternalState,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let response = match req.uri().path() {
        "/health" => {
            let health = Health {
                status: "ok",
                version: crate::VERSION,
                timestamp: SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_secs(),
                uptime_secs: state.started_at.elapsed().as_secs(),
                active_connections: state.active_connections.load(Ordering::Relaxed),
            };
            let body = serde_json::to_string(&health).unwrap_or_else(|_| "{}".to_string());
            response(StatusCode::OK, "application/json", body)
        }
        "/metrics" => match state.metrics.export() {
            Ok(body) => response(StatusCode::OK, "text/plain; version=0.0.4", body),
            Err(e) => {
                error!("Failed to encode metrics: {}", e);
                response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "text/plain",
                    "metrics unavailable".to_string(),
                )
            }
        },
        _ => response(StatusCode::NOT_FOUND, "text/plain", "Not Found".to_string()),
    };

    Ok(response)
}

fn response(status: StatusCode, content_type: &'static str, body: String) -> Response<Full<Bytes>> {
    let mut res = Response::new(Full::new(Bytes::from(body)));
    *res.status_mut() = status;
    res.headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    res
}

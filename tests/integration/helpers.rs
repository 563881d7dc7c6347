//! Test helpers and utilities

use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use http::StatusCode;
use reqwest::{Client, Response};
use tokio::net::TcpListener;

use tokio_esi::config::ServerConfig;
use tokio_esi::core::{RequestContext, Response as EsiResponse};
use tokio_esi::esi::EsiProcessor;
use tokio_esi::handler::{Handler, StaticHandler};
use tokio_esi::observability::Metrics;
use tokio_esi::server::Server;

/// In-process server over a temporary document root.
pub struct TestServer {
    pub base_url: String,
    pub internal_url: String,
    pub addr: SocketAddr,
    pub client: Client,
    pub docroot: tempfile::TempDir,
    server: Arc<Server<StaticHandler>>,
}

#[allow(dead_code)]
impl TestServer {
    /// Start a server with the default include depth.
    pub async fn start() -> Self {
        Self::start_with_depth(tokio_esi::esi::DEFAULT_MAX_DEPTH).await
    }

    /// Start a server with a custom include depth.
    pub async fn start_with_depth(max_depth: usize) -> Self {
        let docroot = tempfile::tempdir().expect("Failed to create docroot");

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind listener");
        let internal = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind internal listener");
        let addr = listener.local_addr().unwrap();
        let internal_addr = internal.local_addr().unwrap();

        let config = ServerConfig {
            listen_addr: addr,
            document_root: docroot.path().to_path_buf(),
            index_file: "index.html".to_string(),
            server_name: None,
            internal_addr: Some(internal_addr),
            access_log: true,
            drain_timeout: Duration::from_secs(1),
        };

        let metrics = Arc::new(Metrics::new().expect("Failed to create metrics"));
        let handler = StaticHandler::new(docroot.path(), "index.html");
        let processor = EsiProcessor::new(handler)
            .with_max_depth(max_depth)
            .with_metrics(Arc::clone(&metrics));

        let server = Arc::new(Server::new(config, processor, metrics));
        let running = Arc::clone(&server);
        tokio::spawn(async move {
            running
                .serve(listener, Some(internal))
                .await
                .expect("Server failed");
        });

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: format!("http://{}", addr),
            internal_url: format!("http://{}", internal_addr),
            addr,
            client,
            docroot,
            server,
        }
    }

    /// Write a file below the document root, creating parent directories.
    pub fn write(&self, path: &str, contents: impl AsRef<[u8]>) {
        let full = self.docroot.path().join(path.trim_start_matches('/'));
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create directory");
        }
        std::fs::write(full, contents).expect("Failed to write file");
    }

    /// Make a GET request to the server
    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .expect("GET request failed")
    }

    /// Make a request with an arbitrary method
    pub async fn request(&self, method: reqwest::Method, path: &str) -> Response {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .send()
            .await
            .expect("Request failed")
    }

    /// Make a request to the internal server
    pub async fn internal_get(&self, path: &str) -> Response {
        self.client
            .get(format!("{}{}", self.internal_url, path))
            .send()
            .await
            .expect("Internal GET request failed")
    }

    /// Stop accepting connections.
    pub fn shutdown(&self) {
        self.server.trigger_shutdown();
    }
}

/// Assert response status
pub fn assert_status(resp: &Response, expected: StatusCode) {
    assert_eq!(
        resp.status().as_u16(),
        expected.as_u16(),
        "Expected status {}, got {}",
        expected,
        resp.status()
    );
}

/// Assert header value
pub fn assert_header(resp: &Response, name: &str, expected: &str) {
    let value = resp
        .headers()
        .get(name)
        .unwrap_or_else(|| panic!("Header {} not found", name))
        .to_str()
        .expect("Invalid header value");
    assert_eq!(value, expected, "Header {} mismatch", name);
}

/// Assert header is absent
pub fn assert_no_header(resp: &Response, name: &str) {
    assert!(
        resp.headers().get(name).is_none(),
        "Header {} should not be present",
        name
    );
}

/// Assert header exists
pub fn assert_has_header(resp: &Response, name: &str) {
    assert!(
        resp.headers().get(name).is_some(),
        "Header {} should be present",
        name
    );
}

/// Canned response for [`Recorder`].
#[derive(Clone)]
pub struct Canned {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: &'static str,
}

/// Scripted inner handler that records every context it receives.
#[derive(Default)]
pub struct Recorder {
    routes: Vec<(&'static str, Canned)>,
    seen: Mutex<Vec<RequestContext>>,
}

#[allow(dead_code)]
impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` as `text/html` for `path`.
    pub fn html(self, path: &'static str, body: &'static str) -> Self {
        self.canned(
            path,
            Canned {
                status: StatusCode::OK,
                content_type: "text/html; charset=utf-8",
                body,
            },
        )
    }

    pub fn canned(mut self, path: &'static str, canned: Canned) -> Self {
        self.routes.push((path, canned));
        self
    }

    /// All contexts seen so far, in call order.
    pub fn seen(&self) -> Vec<RequestContext> {
        self.seen.lock().unwrap().clone()
    }

    /// Paths (with query) seen so far, in call order.
    pub fn paths(&self) -> Vec<String> {
        self.seen()
            .iter()
            .map(|c| match c.query() {
                Some(q) => format!("{}?{}", c.path(), q),
                None => c.path(),
            })
            .collect()
    }
}

#[async_trait]
impl Handler for Recorder {
    async fn handle(&self, ctx: &RequestContext) -> tokio_esi::core::Result<EsiResponse> {
        self.seen.lock().unwrap().push(ctx.clone());

        let path = ctx.path();
        let response = match self.routes.iter().find(|(p, _)| *p == path) {
            Some((_, canned)) => EsiResponse::builder()
                .status(canned.status)
                .content_type(canned.content_type)
                .header("ETag", "\"recorded\"")
                .body(canned.body)
                .build(),
            None => EsiResponse::not_found(),
        };
        Ok(response)
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

/// Read a file below `root` (for byte-exact comparisons).
#[allow(dead_code)]
pub fn read(root: &Path, path: &str) -> Vec<u8> {
    std::fs::read(root.join(path.trim_start_matches('/'))).expect("Failed to read file")
}

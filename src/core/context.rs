//! Request context passed to inner handlers.
//!
//! A [`RequestContext`] carries the CGI-style request attributes a handler
//! needs (method, script name, path info, query string, server identity)
//! plus the transport metadata of the original request. Contexts are never
//! mutated across include dispatches: every nested request gets its own copy
//! via [`RequestContext::derive_include`].

use std::cell::Cell;
use std::net::IpAddr;

use bytes::Bytes;
use http::header::{self, HeaderName};
use http::{HeaderMap, Method};

use crate::esi::IncludeTarget;

/// Headers that describe how the *enclosing* request was transported and
/// must not leak into an include sub-request.
static TRANSPORT_HEADERS: [HeaderName; 5] = [
    header::ACCEPT_ENCODING,
    header::TE,
    header::CONTENT_LENGTH,
    header::CONTENT_TYPE,
    header::TRANSFER_ENCODING,
];

/// Request attributes seen by a [`Handler`](crate::handler::Handler).
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// HTTP method.
    pub method: Method,

    /// Mount point of the handler (may be empty).
    pub script_name: String,

    /// Path below the mount point, always starting with `/` when non-empty.
    pub path_info: String,

    /// Raw query string without the leading `?` (empty if none).
    pub query_string: String,

    /// Server name used for same-origin dispatch.
    pub server_name: String,

    /// Server port used for same-origin dispatch.
    pub server_port: u16,

    /// Original request-target as received on the wire, if known.
    pub request_uri: Option<String>,

    /// Request headers.
    pub headers: HeaderMap,

    /// Request body.
    pub body: Bytes,

    /// Peer address of the client connection.
    pub remote_addr: Option<IpAddr>,

    /// Short request ID for log correlation.
    pub request_id: String,
}

impl RequestContext {
    /// Create a context builder for the given server identity.
    #[inline]
    pub fn builder(server_name: impl Into<String>, server_port: u16) -> ContextBuilder {
        ContextBuilder::new(server_name, server_port)
    }

    /// Build a context from an `http::Request`.
    ///
    /// The request-target becomes `path_info` and `query_string`; the
    /// server identity is supplied by the host, never taken from the
    /// request itself.
    pub fn from_http(
        req: http::Request<Bytes>,
        server_name: impl Into<String>,
        server_port: u16,
    ) -> Self {
        let (parts, body) = req.into_parts();
        let request_uri = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string());

        ContextBuilder::new(server_name, server_port)
            .method(parts.method)
            .path_info(parts.uri.path())
            .query_string(parts.uri.query().unwrap_or(""))
            .request_uri(request_uri)
            .headers(parts.headers)
            .body(body)
            .build()
    }

    /// Full request path (`script_name` + `path_info`).
    #[inline]
    pub fn path(&self) -> String {
        let mut path = String::with_capacity(self.script_name.len() + self.path_info.len());
        path.push_str(&self.script_name);
        path.push_str(&self.path_info);
        path
    }

    /// Query string, or `None` if empty.
    #[inline]
    pub fn query(&self) -> Option<&str> {
        if self.query_string.is_empty() {
            None
        } else {
            Some(&self.query_string)
        }
    }

    /// Get a header value by name (case-insensitive).
    #[inline]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Derive the context for an include sub-request.
    ///
    /// The derived request is a bodiless GET for the target's path and query
    /// on the same server as `self`. Transport hints of the enclosing request
    /// (content negotiation, body framing, original request-target) are
    /// dropped. `self` is left untouched.
    pub fn derive_include(&self, target: &IncludeTarget) -> RequestContext {
        let mut headers = self.headers.clone();
        for name in &TRANSPORT_HEADERS {
            headers.remove(name);
        }

        RequestContext {
            method: Method::GET,
            script_name: String::new(),
            path_info: target.path().to_string(),
            query_string: target.query().to_string(),
            server_name: self.server_name.clone(),
            server_port: self.server_port,
            request_uri: None,
            headers,
            body: Bytes::new(),
            remote_addr: self.remote_addr,
            request_id: self.request_id.clone(),
        }
    }
}

/// Builder for [`RequestContext`].
pub struct ContextBuilder {
    method: Method,
    script_name: String,
    path_info: String,
    query_string: String,
    server_name: String,
    server_port: u16,
    request_uri: Option<String>,
    headers: HeaderMap,
    body: Bytes,
    remote_addr: Option<IpAddr>,
    request_id: Option<String>,
}

impl ContextBuilder {
    /// Create a new builder for a GET of `/`.
    #[inline]
    pub fn new(server_name: impl Into<String>, server_port: u16) -> Self {
        Self {
            method: Method::GET,
            script_name: String::new(),
            path_info: "/".to_string(),
            query_string: String::new(),
            server_name: server_name.into(),
            server_port,
            request_uri: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            remote_addr: None,
            request_id: None,
        }
    }

    #[inline]
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    #[inline]
    pub fn script_name(mut self, script_name: impl Into<String>) -> Self {
        self.script_name = script_name.into();
        self
    }

    #[inline]
    pub fn path_info(mut self, path_info: impl Into<String>) -> Self {
        self.path_info = path_info.into();
        self
    }

    #[inline]
    pub fn query_string(mut self, query_string: impl Into<String>) -> Self {
        self.query_string = query_string.into();
        self
    }

    #[inline]
    pub fn request_uri(mut self, request_uri: Option<String>) -> Self {
        self.request_uri = request_uri;
        self
    }

    #[inline]
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Add a single header by strings. Invalid names or values are ignored.
    #[inline]
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name.as_ref()),
            http::HeaderValue::try_from(value.as_ref()),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    #[inline]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    #[inline]
    pub fn remote_addr(mut self, addr: IpAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    #[inline]
    pub fn request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Build the context. A request ID is generated if none was set.
    pub fn build(self) -> RequestContext {
        RequestContext {
            method: self.method,
            script_name: self.script_name,
            path_info: self.path_info,
            query_string: self.query_string,
            server_name: self.server_name,
            server_port: self.server_port,
            request_uri: self.request_uri,
            headers: self.headers,
            body: self.body,
            remote_addr: self.remote_addr,
            request_id: self.request_id.unwrap_or_else(generate_request_id),
        }
    }
}

// ============================================================================
// Fast random ID generation with thread-local state
// ============================================================================

thread_local! {
    static RNG_STATE: Cell<u64> = Cell::new(init_rng_seed());
}

/// Initialize RNG seed from system entropy.
fn init_rng_seed() -> u64 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};
    use std::time::{SystemTime, UNIX_EPOCH};

    let mut hasher = RandomState::new().build_hasher();
    hasher.write_u64(
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64,
    );
    // xorshift must never be seeded with zero
    hasher.finish() | 1
}

/// Fast random u64 using thread-local xorshift64.
#[inline]
fn rand_u64() -> u64 {
    RNG_STATE.with(|state| {
        let mut x = state.get();
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        state.set(x);
        x
    })
}

/// Generate a short request ID: 12 hex chars of time-salted randomness,
/// a dash, and 4 more hex chars (e.g. `0af7651916cd-b7ad`).
pub fn generate_request_id() -> String {
    use std::fmt::Write;
    use std::time::{SystemTime, UNIX_EPOCH};

    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;

    let mut id = String::with_capacity(17);
    let _ = write!(
        id,
        "{:012x}-{:04x}",
        (millis ^ rand_u64()) & 0xffff_ffff_ffff,
        rand_u64() & 0xffff
    );
    id
}

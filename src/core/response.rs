//! HTTP response abstraction for handlers and the ESI processor.

use bytes::{Bytes, BytesMut};
use http::header::{self, HeaderName};
use http::{HeaderMap, HeaderValue, StatusCode};

/// Common header name constants for fast lookup.
mod header_names {
    use super::*;
    pub static CONTENT_TYPE: HeaderName = header::CONTENT_TYPE;
}

/// Pre-allocated static header values for common content types.
mod content_types {
    use super::*;
    pub static TEXT_PLAIN: HeaderValue = HeaderValue::from_static("text/plain; charset=utf-8");
    pub static TEXT_HTML: HeaderValue = HeaderValue::from_static("text/html; charset=utf-8");
    pub static TEXT_XML: HeaderValue = HeaderValue::from_static("text/xml; charset=utf-8");
}

/// Pre-allocated static bodies for common responses.
mod static_bodies {
    use super::*;
    pub static NOT_FOUND: Bytes = Bytes::from_static(b"Not Found");
    pub static METHOD_NOT_ALLOWED: Bytes = Bytes::from_static(b"Method Not Allowed");
}

/// Response body as a sequence of chunks.
///
/// Handlers may produce their output in pieces; the ESI processor only joins
/// them once it has decided to look at the markup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Body {
    chunks: Vec<Bytes>,
}

impl Body {
    /// Create an empty body.
    #[inline]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a body from a list of chunks.
    #[inline]
    pub fn from_chunks(chunks: Vec<Bytes>) -> Self {
        Self { chunks }
    }

    /// Get the raw chunks.
    #[inline]
    pub fn chunks(&self) -> &[Bytes] {
        &self.chunks
    }

    /// Append a chunk.
    #[inline]
    pub fn push(&mut self, chunk: impl Into<Bytes>) {
        self.chunks.push(chunk.into());
    }

    /// Total length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.chunks.iter().map(Bytes::len).sum()
    }

    /// Check if the body has no bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks.iter().all(Bytes::is_empty)
    }

    /// Join all chunks into one buffer (no copy for a single chunk).
    pub fn concat(&self) -> Bytes {
        match self.chunks.as_slice() {
            [] => Bytes::new(),
            [only] => only.clone(),
            chunks => {
                let mut buf = BytesMut::with_capacity(self.len());
                for chunk in chunks {
                    buf.extend_from_slice(chunk);
                }
                buf.freeze()
            }
        }
    }
}

impl From<Bytes> for Body {
    fn from(chunk: Bytes) -> Self {
        Self {
            chunks: vec![chunk],
        }
    }
}

impl From<Vec<u8>> for Body {
    fn from(chunk: Vec<u8>) -> Self {
        Bytes::from(chunk).into()
    }
}

impl From<String> for Body {
    fn from(chunk: String) -> Self {
        Bytes::from(chunk).into()
    }
}

impl From<&'static str> for Body {
    fn from(chunk: &'static str) -> Self {
        Bytes::from_static(chunk.as_bytes()).into()
    }
}

impl From<Vec<Bytes>> for Body {
    fn from(chunks: Vec<Bytes>) -> Self {
        Self { chunks }
    }
}

/// HTTP response: status, headers and a chunked body.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Body,
}

impl Response {
    /// Create a new response builder.
    #[inline]
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder::new()
    }

    /// Create a response from its parts.
    #[inline]
    pub fn from_parts(status: StatusCode, headers: HeaderMap, body: impl Into<Body>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// Create a 200 OK response with body.
    #[inline]
    pub fn ok(body: impl Into<Body>) -> Self {
        Self::from_parts(StatusCode::OK, HeaderMap::new(), body)
    }

    /// Create a 404 Not Found response (uses static body).
    #[inline]
    pub fn not_found() -> Self {
        Self::from_parts(
            StatusCode::NOT_FOUND,
            text_headers(),
            static_bodies::NOT_FOUND.clone(),
        )
    }

    /// Create a 405 Method Not Allowed response.
    #[inline]
    pub fn method_not_allowed() -> Self {
        let mut headers = text_headers();
        headers.insert(header::ALLOW, HeaderValue::from_static("GET, HEAD"));
        Self::from_parts(
            StatusCode::METHOD_NOT_ALLOWED,
            headers,
            static_bodies::METHOD_NOT_ALLOWED.clone(),
        )
    }

    /// Create a plain-text error response with the given status.
    #[inline]
    pub fn error(status: StatusCode, msg: &str) -> Self {
        Self::from_parts(
            status,
            text_headers(),
            Bytes::copy_from_slice(msg.as_bytes()),
        )
    }

    /// Create an empty response with given status.
    #[inline]
    pub fn empty(status: StatusCode) -> Self {
        Self::from_parts(status, HeaderMap::new(), Body::empty())
    }

    // Getters

    /// Get the status code.
    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Get the headers.
    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get a mutable reference to headers.
    #[inline]
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Get the response body.
    #[inline]
    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Split into status, headers and body.
    #[inline]
    pub fn into_parts(self) -> (StatusCode, HeaderMap, Body) {
        (self.status, self.headers, self.body)
    }

    /// Get a header value by string name (case-insensitive).
    #[inline]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Get Content-Type header (fast path).
    #[inline]
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(&header_names::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::empty(StatusCode::OK)
    }
}

impl From<Response> for http::Response<Bytes> {
    fn from(res: Response) -> Self {
        let mut out = http::Response::new(res.body.concat());
        *out.status_mut() = res.status;
        *out.headers_mut() = res.headers;
        out
    }
}

impl<B> From<http::Response<B>> for Response
where
    B: Into<Bytes>,
{
    fn from(res: http::Response<B>) -> Self {
        let (parts, body) = res.into_parts();
        Self {
            status: parts.status,
            headers: parts.headers,
            body: Body::from(Into::<Bytes>::into(body)),
        }
    }
}

fn text_headers() -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(2);
    headers.insert(
        header_names::CONTENT_TYPE.clone(),
        content_types::TEXT_PLAIN.clone(),
    );
    headers
}

/// Builder for creating HTTP responses.
pub struct ResponseBuilder {
    status: StatusCode,
    headers: Option<HeaderMap>, // Lazy allocation
    body: Body,
}

impl Default for ResponseBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseBuilder {
    /// Create a new response builder.
    #[inline]
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: None,
            body: Body::empty(),
        }
    }

    /// Set the status code.
    #[inline]
    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Add header with typed HeaderName and HeaderValue.
    #[inline]
    pub fn header_value(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers
            .get_or_insert_with(HeaderMap::new)
            .insert(name, value);
        self
    }

    /// Add header by strings. Invalid names or values are ignored.
    #[inline]
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name.as_ref()),
            HeaderValue::try_from(value.as_ref()),
        ) {
            self.headers
                .get_or_insert_with(HeaderMap::new)
                .insert(name, value);
        }
        self
    }

    /// Set the body.
    #[inline]
    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    /// Append one body chunk.
    #[inline]
    pub fn chunk(mut self, chunk: impl Into<Bytes>) -> Self {
        self.body.push(chunk);
        self
    }

    /// Set Content-Type header (generic).
    #[inline]
    pub fn content_type(self, content_type: &str) -> Self {
        self.header("content-type", content_type)
    }

    /// Set Content-Type to text/html.
    #[inline]
    pub fn html(self) -> Self {
        self.header_value(
            header_names::CONTENT_TYPE.clone(),
            content_types::TEXT_HTML.clone(),
        )
    }

    /// Set Content-Type to text/xml.
    #[inline]
    pub fn xml(self) -> Self {
        self.header_value(
            header_names::CONTENT_TYPE.clone(),
            content_types::TEXT_XML.clone(),
        )
    }

    /// Set Content-Type to text/plain.
    #[inline]
    pub fn text(self) -> Self {
        self.header_value(
            header_names::CONTENT_TYPE.clone(),
            content_types::TEXT_PLAIN.clone(),
        )
    }

    /// Build the response.
    #[inline]
    pub fn build(self) -> Response {
        Response {
            status: self.status,
            headers: self.headers.unwrap_or_default(),
            body: self.body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_builder() {
        let res = Response::builder()
            .status(StatusCode::CREATED)
            .header("x-custom", "value")
            .body("Hello")
            .build();

        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(res.header("x-custom"), Some("value"));
        assert_eq!(res.body().concat().as_ref(), b"Hello");
    }

    #[test]
    fn test_body_concat_chunks() {
        let res = Response::builder()
            .html()
            .chunk("<p>")
            .chunk("hello")
            .chunk("</p>")
            .build();

        assert_eq!(res.body().chunks().len(), 3);
        assert_eq!(res.body().len(), 12);
        assert_eq!(res.body().concat().as_ref(), b"<p>hello</p>");
    }

    #[test]
    fn test_body_concat_single_chunk_is_shared() {
        let chunk = Bytes::from_static(b"shared");
        let body = Body::from(chunk.clone());

        assert_eq!(body.concat().as_ptr(), chunk.as_ptr());
    }

    #[test]
    fn test_body_empty() {
        assert!(Body::empty().is_empty());
        assert!(Body::from_chunks(vec![Bytes::new(), Bytes::new()]).is_empty());
        assert_eq!(Body::empty().concat().len(), 0);
    }

    #[test]
    fn test_response_not_found() {
        let res = Response::not_found();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(res.content_type(), Some("text/plain; charset=utf-8"));
        assert_eq!(res.body().concat().as_ref(), b"Not Found");
    }

    #[test]
    fn test_response_method_not_allowed() {
        let res = Response::method_not_allowed();
        assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(res.header("allow"), Some("GET, HEAD"));
    }

    #[test]
    fn test_response_content_types() {
        let html = Response::builder().html().body("<h1>Hi</h1>").build();
        assert_eq!(html.content_type(), Some("text/html; charset=utf-8"));

        let xml = Response::builder().xml().body("<a/>").build();
        assert_eq!(xml.content_type(), Some("text/xml; charset=utf-8"));

        let text = Response::builder().text().body("Hello").build();
        assert_eq!(text.content_type(), Some("text/plain; charset=utf-8"));
    }

    #[test]
    fn test_response_to_http() {
        let res = Response::builder()
            .status(StatusCode::OK)
            .header("x-test", "value")
            .chunk("Hel")
            .chunk("lo")
            .build();

        let http_res: http::Response<Bytes> = res.into();
        assert_eq!(http_res.status(), StatusCode::OK);
        assert_eq!(http_res.headers().get("x-test").unwrap(), "value");
        assert_eq!(http_res.body().as_ref(), b"Hello");
    }

    #[test]
    fn test_response_empty_builder_no_headers() {
        let res = Response::builder().status(StatusCode::NO_CONTENT).build();
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        assert!(res.headers().is_empty());
    }
}

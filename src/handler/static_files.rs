//! Static file serving from a document root.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{self, HeaderValue};
use http::{Method, StatusCode};
use percent_encoding::percent_decode_str;

use super::Handler;
use crate::core::time::http_date;
use crate::core::{RequestContext, Response, Result};

/// Serves files below a document root.
///
/// Emits `Last-Modified` and `ETag` validators for every file, which the ESI
/// processor strips again once a document has been assembled.
pub struct StaticHandler {
    document_root: PathBuf,
    index_file: String,
}

impl StaticHandler {
    pub fn new(document_root: impl Into<PathBuf>, index_file: impl Into<String>) -> Self {
        Self {
            document_root: document_root.into(),
            index_file: index_file.into(),
        }
    }

    /// Get the document root.
    #[inline]
    pub fn document_root(&self) -> &Path {
        &self.document_root
    }

    /// Map a request path onto the filesystem.
    ///
    /// Returns `None` for paths that are not valid UTF-8 after decoding or
    /// that try to escape the document root.
    fn resolve_path(&self, request_path: &str) -> Option<PathBuf> {
        let decoded = percent_decode_str(request_path).decode_utf8().ok()?;
        let relative = Path::new(decoded.trim_start_matches('/'));

        let mut path = self.document_root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => path.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return None
                }
            }
        }
        Some(path)
    }
}

#[async_trait]
impl Handler for StaticHandler {
    async fn handle(&self, ctx: &RequestContext) -> Result<Response> {
        // HEAD reads the file too: the host drops the body only after ESI
        // processing so both methods report the same headers.
        if ctx.method != Method::GET && ctx.method != Method::HEAD {
            return Ok(Response::method_not_allowed());
        }

        let Some(mut path) = self.resolve_path(&ctx.path()) else {
            return Ok(Response::not_found());
        };

        let mut metadata = match tokio::fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) if is_missing(&e) => return Ok(Response::not_found()),
            Err(e) => return Err(e.into()),
        };

        if metadata.is_dir() {
            path.push(&self.index_file);
            metadata = match tokio::fs::metadata(&path).await {
                Ok(m) => m,
                Err(e) if is_missing(&e) => return Ok(Response::not_found()),
                Err(e) => return Err(e.into()),
            };
        }

        let contents = match tokio::fs::read(&path).await {
            Ok(c) => c,
            Err(e) if is_missing(&e) => return Ok(Response::not_found()),
            Err(e) => return Err(e.into()),
        };

        let mime = mime_guess::from_path(&path)
            .first_or_octet_stream()
            .to_string();

        let mut builder = Response::builder()
            .status(StatusCode::OK)
            .content_type(&mime)
            .header_value(header::CONTENT_LENGTH, HeaderValue::from(contents.len()));

        if let Ok(modified) = metadata.modified() {
            let secs = modified
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs();
            builder = builder
                .header("Last-Modified", http_date(modified))
                .header("ETag", format!("\"{:x}-{:x}\"", contents.len(), secs));
        }

        tracing::debug!(
            path = %path.display(),
            mime = %mime,
            bytes = contents.len(),
            "Serving static file"
        );

        Ok(builder.body(Bytes::from(contents)).build())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

#[inline]
fn is_missing(e: &std::io::Error) -> bool {
    matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory)
}

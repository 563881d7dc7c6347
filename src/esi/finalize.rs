//! Response finalization after directives were resolved.

use http::header::{self, HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};

use super::markup::Document;
use crate::core::Response;

/// Cache policy for assembled documents.
pub static ASSEMBLED_CACHE_CONTROL: HeaderValue =
    HeaderValue::from_static("private, max-age=0, must-revalidate");

/// Validators that described the unassembled base document.
static STALE_VALIDATORS: [HeaderName; 3] = [header::EXPIRES, header::LAST_MODIFIED, header::ETAG];

/// Serialize `doc` and rewrite body- and cache-describing headers.
///
/// Status and all other headers pass through unchanged.
pub fn finalize(status: StatusCode, mut headers: HeaderMap, doc: Document) -> Response {
    let body = doc.serialize();

    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
    headers.insert(header::CACHE_CONTROL, ASSEMBLED_CACHE_CONTROL.clone());
    for name in &STALE_VALIDATORS {
        headers.remove(name);
    }

    Response::from_parts(status, headers, body)
}

//! EsiProcessor driven directly with a recording inner handler

use crate::helpers::*;
use http::{Method, StatusCode};
use tokio_esi::core::RequestContext;
use tokio_esi::esi::{EsiError, EsiProcessor};

fn top_level(path: &str) -> RequestContext {
    RequestContext::builder("shop.example.test", 443)
        .method(Method::POST)
        .path_info(path)
        .query_string("ref=mail")
        .request_uri(Some(format!("{}?ref=mail", path)))
        .header("accept-encoding", "br, gzip")
        .header("content-type", "application/json")
        .header("content-length", "2")
        .header("cookie", "cart=7")
        .body("{}")
        .request_id("0123456789ab-cdef")
        .build()
}

/// Test that every include gets its own sanitized GET context
#[tokio::test]
async fn test_include_contexts() {
    let processor = EsiProcessor::new(
        Recorder::new()
            .html(
                "/cart",
                "<esi:include src=\"/frag/summary?currency=EUR\"/><esi:include src=\"https://shop.example.test:443/frag/total\"/>",
            )
            .html("/frag/summary", "S")
            .html("/frag/total", "T"),
    );

    let ctx = top_level("/cart");
    let res = processor.call(&ctx).await.unwrap();

    assert_eq!(res.body().concat().as_ref(), b"ST");
    assert_eq!(
        processor.handler().paths(),
        ["/cart?ref=mail", "/frag/summary?currency=EUR", "/frag/total"]
    );

    for include in &processor.handler().seen()[1..] {
        assert_eq!(include.method, Method::GET);
        assert_eq!(include.script_name, "");
        assert_eq!(include.server_name, "shop.example.test");
        assert_eq!(include.server_port, 443);
        assert_eq!(include.request_uri, None);
        assert!(include.body.is_empty());
        assert_eq!(include.header("accept-encoding"), None);
        assert_eq!(include.header("content-type"), None);
        assert_eq!(include.header("content-length"), None);
        assert_eq!(include.header("cookie"), Some("cart=7"));
        assert_eq!(include.request_id, "0123456789ab-cdef");
    }

    // The caller's context is never touched
    assert_eq!(ctx.method, Method::POST);
    assert_eq!(ctx.request_uri.as_deref(), Some("/cart?ref=mail"));
    assert_eq!(ctx.header("accept-encoding"), Some("br, gzip"));
    assert_eq!(ctx.body.as_ref(), b"{}");
}

/// Test that a redirecting fragment is a failure, not followed
#[tokio::test]
async fn test_redirect_is_include_failure() {
    let processor = EsiProcessor::new(
        Recorder::new().html("/", "<esi:include src=\"/moved\"/>").canned(
            "/moved",
            Canned {
                status: StatusCode::MOVED_PERMANENTLY,
                content_type: "text/html",
                body: "<a href=\"/new\">moved</a>",
            },
        ),
    );

    let err = processor.call(&top_level("/")).await.unwrap_err();

    match err {
        EsiError::IncludeFailed { src, status } => {
            assert_eq!(src, "/moved");
            assert_eq!(status, StatusCode::MOVED_PERMANENTLY);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(processor.handler().paths(), ["/?ref=mail", "/moved"]);
}

/// Test that included content is spliced verbatim
#[tokio::test]
async fn test_fragment_is_opaque_text() {
    let processor = EsiProcessor::new(
        Recorder::new()
            .html("/", "<div><esi:include src=\"/json\"/></div>")
            .canned(
                "/json",
                Canned {
                    status: StatusCode::OK,
                    content_type: "application/json",
                    body: "{\"tag\":\"<esi:remove>kept</esi:remove>\"}",
                },
            ),
    );

    let res = processor.call(&top_level("/")).await.unwrap();

    assert_eq!(
        res.body().concat().as_ref(),
        b"<div>{\"tag\":\"<esi:remove>kept</esi:remove>\"}</div>"
    );
}

/// Test that includes inside removed regions are still fetched
#[tokio::test]
async fn test_include_inside_remove_is_resolved() {
    let processor = EsiProcessor::new(
        Recorder::new()
            .html(
                "/",
                "<p>x<esi:remove><esi:include src=\"/hidden\"/></esi:remove>y</p>",
            )
            .html("/hidden", "h"),
    );

    let res = processor.call(&top_level("/")).await.unwrap();

    assert_eq!(res.body().concat().as_ref(), b"<p>xy</p>");
    assert_eq!(processor.handler().paths(), ["/?ref=mail", "/hidden"]);
}

/// Test that the handler is not called past the depth limit
#[tokio::test]
async fn test_depth_limit_skips_handler() {
    let processor =
        EsiProcessor::new(Recorder::new().html("/", "never served")).with_max_depth(2);

    let err = processor.process(&top_level("/"), 3).await.unwrap_err();

    assert_eq!(
        err.to_string(),
        "too many levels of ESI processing: level 3 reached (max 2)"
    );
    assert!(processor.handler().seen().is_empty());
}

/// Test that a non-markup response is returned as-is
#[tokio::test]
async fn test_passthrough_keeps_headers() {
    let processor = EsiProcessor::new(Recorder::new().canned(
        "/feed",
        Canned {
            status: StatusCode::OK,
            content_type: "application/rss+xml",
            body: "<rss><esi:include src=\"/x\"/></rss>",
        },
    ));

    let res = processor.call(&top_level("/feed")).await.unwrap();

    assert_eq!(res.header("etag"), Some("\"recorded\""));
    assert!(res.header("cache-control").is_none());
    assert_eq!(
        res.body().concat().as_ref(),
        b"<rss><esi:include src=\"/x\"/></rss>"
    );
    assert_eq!(processor.handler().seen().len(), 1);
}

/// Test that HEAD on an ESI page reports the assembled GET headers
#[tokio::test]
async fn test_head_matches_get_headers() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("index.html"),
        "<p><esi:include src=\"/f.html\"/></p>",
    )
    .unwrap();
    std::fs::write(dir.path().join("f.html"), "<b>fragment</b>").unwrap();

    let processor = EsiProcessor::new(tokio_esi::handler::StaticHandler::new(
        dir.path(),
        "index.html",
    ));

    let request = |method: Method| {
        RequestContext::builder("localhost", 8080)
            .method(method)
            .path_info("/")
            .build()
    };

    let get = processor.call(&request(Method::GET)).await.unwrap();
    let head = processor.call(&request(Method::HEAD)).await.unwrap();

    assert_eq!(get.header("content-length"), Some("22"));
    assert_eq!(head.headers(), get.headers());
    assert_eq!(
        head.header("cache-control"),
        Some("private, max-age=0, must-revalidate")
    );
    assert!(head.header("etag").is_none());
    assert!(head.header("last-modified").is_none());
}

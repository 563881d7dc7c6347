//! End-to-end ESI assembly over HTTP

use crate::helpers::*;
use http::StatusCode;

/// Test a page assembled from two fragments
#[tokio::test]
async fn test_assembles_includes() {
    let server = TestServer::start().await;
    server.write(
        "index.html",
        "<html><body><esi:include src=\"/frag/header.html\"/><main>news</main><esi:include src=\"/frag/footer.html\"/></body></html>",
    );
    server.write("frag/header.html", "<header>H</header>");
    server.write("frag/footer.html", "<footer>F</footer>");

    let resp = server.get("/").await;

    assert_status(&resp, StatusCode::OK);
    assert_header(&resp, "cache-control", "private, max-age=0, must-revalidate");
    assert_no_header(&resp, "etag");
    assert_no_header(&resp, "last-modified");

    let expected =
        "<html><body><header>H</header><main>news</main><footer>F</footer></body></html>";
    assert_header(&resp, "content-length", &expected.len().to_string());
    assert_eq!(resp.text().await.unwrap(), expected);
}

/// Test that documents without directives keep their validators
#[tokio::test]
async fn test_plain_page_passes_through() {
    let server = TestServer::start().await;
    server.write("plain.html", "<p>no directives here</p>");

    let resp = server.get("/plain.html").await;

    assert_status(&resp, StatusCode::OK);
    assert_has_header(&resp, "etag");
    assert_has_header(&resp, "last-modified");
    assert_eq!(resp.text().await.unwrap(), "<p>no directives here</p>");
}

/// Test that non-markup files are never parsed
#[tokio::test]
async fn test_non_markup_passes_through() {
    let server = TestServer::start().await;
    let css = "/* <esi:include src=\"/nope\"/> */ body { color: red }";
    server.write("site.css", css);

    let resp = server.get("/site.css").await;

    assert_status(&resp, StatusCode::OK);
    assert_has_header(&resp, "etag");
    assert_eq!(resp.text().await.unwrap(), css);
}

/// Test fragments including fragments
#[tokio::test]
async fn test_nested_fragments() {
    let server = TestServer::start().await;
    server.write("page.html", "<div><esi:include src=\"/frag/a.html\"/></div>");
    server.write("frag/a.html", "<a><esi:include src=\"/frag/b.html\"/></a>");
    server.write("frag/b.html", "<b>leaf</b>");

    let resp = server.get("/page.html").await;

    assert_eq!(resp.text().await.unwrap(), "<div><a><b>leaf</b></a></div>");
}

/// Test that a same-origin absolute URL is accepted
#[tokio::test]
async fn test_same_origin_absolute_url() {
    let server = TestServer::start().await;
    server.write(
        "page.html",
        format!(
            "<p><esi:include src=\"http://{}/frag/nav.html\"/></p>",
            server.addr
        ),
    );
    server.write("frag/nav.html", "<nav/>");

    let resp = server.get("/page.html").await;

    assert_status(&resp, StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "<p><nav/></p>");
}

/// Test that a foreign host is never fetched
#[tokio::test]
async fn test_foreign_include_fails() {
    let server = TestServer::start().await;
    server.write(
        "page.html",
        "<esi:include src=\"http://evil.example/steal\"/>",
    );

    let resp = server.get("/page.html").await;

    assert_status(&resp, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        resp.text().await.unwrap(),
        "500 Internal Server Error\n"
    );
}

/// Test that a missing fragment fails the whole page
#[tokio::test]
async fn test_missing_fragment_fails() {
    let server = TestServer::start().await;
    server.write("page.html", "<p>before<esi:include src=\"/frag/gone.html\"/></p>");

    let resp = server.get("/page.html").await;

    assert_status(&resp, StatusCode::BAD_GATEWAY);
}

/// Test the include depth limit over HTTP
#[tokio::test]
async fn test_depth_limit() {
    let server = TestServer::start_with_depth(1).await;
    server.write("one.html", "1<esi:include src=\"/two.html\"/>");
    server.write("two.html", "2<esi:include src=\"/three.html\"/>");
    server.write("three.html", "3");

    // Depth 0 -> 1 is allowed
    let resp = server.get("/two.html").await;
    assert_eq!(resp.text().await.unwrap(), "23");

    // Depth 0 -> 1 -> 2 is not
    let resp = server.get("/one.html").await;
    assert_status(&resp, StatusCode::INTERNAL_SERVER_ERROR);
}

/// Test remove and comment stripping with multibyte content
#[tokio::test]
async fn test_remove_and_comment() {
    let server = TestServer::start().await;
    server.write(
        "page.html",
        "<p>héllo<esi:remove><a href=\"/fallback\">fallback</a></esi:remove><esi:comment text=\"internal\"/></p>",
    );

    let resp = server.get("/page.html").await;

    assert_header(&resp, "content-length", "13");
    assert_eq!(resp.text().await.unwrap(), "<p>héllo</p>");
}

/// Test that HEAD returns the assembled headers without a body
#[tokio::test]
async fn test_head_uses_assembled_headers() {
    let server = TestServer::start().await;
    server.write("index.html", "<p><esi:include src=\"/f.html\"/></p>");
    server.write("f.html", "<b>fragment</b>");

    let get = server.get("/").await;
    let head = server.request(reqwest::Method::HEAD, "/").await;

    assert_status(&head, StatusCode::OK);
    assert_header(&get, "content-length", "22");
    assert_header(&head, "content-length", "22");
    assert_header(&head, "cache-control", "private, max-age=0, must-revalidate");
    assert_no_header(&head, "etag");
    assert_no_header(&head, "last-modified");
    assert!(head.bytes().await.unwrap().is_empty());
}

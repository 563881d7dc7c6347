//! Static file serving tests

use crate::helpers::*;
use http::StatusCode;

/// Test serving a CSS file
#[tokio::test]
async fn test_serve_css_file() {
    let server = TestServer::start().await;
    server.write("styles.css", "body {}");

    let resp = server.get("/styles.css").await;

    assert_status(&resp, StatusCode::OK);
    assert_header(&resp, "content-type", "text/css");
    assert_header(&resp, "content-length", "7");
}

/// Test 404 for non-existent file
#[tokio::test]
async fn test_static_file_not_found() {
    let server = TestServer::start().await;

    let resp = server.get("/nonexistent.css").await;

    assert_status(&resp, StatusCode::NOT_FOUND);
}

/// Test directory index
#[tokio::test]
async fn test_directory_index() {
    let server = TestServer::start().await;
    server.write("docs/index.html", "<h1>docs</h1>");

    let resp = server.get("/docs/").await;

    assert_status(&resp, StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "<h1>docs</h1>");
}

/// Test that POST is rejected
#[tokio::test]
async fn test_post_not_allowed() {
    let server = TestServer::start().await;
    server.write("index.html", "<p>home</p>");

    let resp = server.request(reqwest::Method::POST, "/").await;

    assert_status(&resp, StatusCode::METHOD_NOT_ALLOWED);
    assert_header(&resp, "allow", "GET, HEAD");
}

/// Test directory traversal protection
#[tokio::test]
async fn test_directory_traversal_protection() {
    let server = TestServer::start().await;

    let resp = server.get("/%2e%2e/%2e%2e/etc/passwd").await;

    assert_status(&resp, StatusCode::NOT_FOUND);
}

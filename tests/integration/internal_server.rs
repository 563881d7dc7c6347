//! Internal server tests (/health, /metrics)

use crate::helpers::*;
use http::StatusCode;

/// Test health endpoint
#[tokio::test]
async fn test_health_endpoint() {
    let server = TestServer::start().await;

    let resp = server.internal_get("/health").await;

    assert_status(&resp, StatusCode::OK);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

/// Test metrics after serving an assembled page
#[tokio::test]
async fn test_metrics_endpoint() {
    let server = TestServer::start().await;
    server.write("index.html", "<esi:include src=\"/frag.html\"/>");
    server.write("frag.html", "F");

    server.get("/").await;
    let resp = server.internal_get("/metrics").await;

    assert_status(&resp, StatusCode::OK);
    let body = resp.text().await.unwrap();
    assert!(body.contains("tokio_esi_documents_total{outcome=\"assembled\"} 1"));
    assert!(body.contains("tokio_esi_includes_total{status=\"200\"} 1"));
    assert!(body.contains("tokio_esi_http_requests_total"));
}

/// Test that shutdown stops the accept loop
#[tokio::test]
async fn test_shutdown_stops_accepting() {
    let server = TestServer::start().await;
    server.write("index.html", "up");
    assert_status(&server.get("/").await, StatusCode::OK);

    server.shutdown();
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let result = reqwest::Client::new()
        .get(format!("{}/", server.base_url))
        .send()
        .await;
    assert!(result.is_err());
}

//! Integration tests for health, global search, notifications and system endpoints.

mod common;

use axum::http::{header, Method, StatusCode};
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn health_is_public() {
    let app = TestApp::new().await;

    let res = app.request(Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.text);
    assert_eq!(res.json["status"], "healthy");
    assert_eq!(res.json["database"]["status"], "healthy");

    let detailed = app
        .request(Method::GET, "/api/v1/health?detailed=true", None, None)
        .await;
    assert!(detailed.json["counts"].is_object(), "{}", detailed.text);
}

#[tokio::test]
async fn responses_carry_request_id() {
    let app = TestApp::new().await;

    let res = app.request(Method::GET, "/api/v1/health", None, None).await;
    assert!(res.headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn search_finds_committees_and_receipts() {
    let app = TestApp::new().await;
    let committee_id = app.create_committee("Pithapuram", "PTM-AMC").await;
    app.create_receipt(&committee_id, "S-1", "2025-06-10", 100.0)
        .await;

    let all = app
        .admin(Method::GET, "/api/v1/search?q=pitha", None)
        .await;
    assert_eq!(all.status, StatusCode::OK, "{}", all.text);
    assert_eq!(all.json["data"]["type"], "all");
    assert!(all.json["data"]["totalResults"].as_u64().unwrap_or(0) >= 1);

    let short = app.admin(Method::GET, "/api/v1/search?q=p", None).await;
    assert_eq!(short.status, StatusCode::BAD_REQUEST);

    let bad_type = app
        .admin(Method::GET, "/api/v1/search?q=pitha&type=traders", None)
        .await;
    assert_eq!(bad_type.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn notifications_feed_lists_recent_receipts() {
    let app = TestApp::new().await;
    let committee_id = app.create_committee("Tuni", "TUNI-AMC").await;
    app.create_receipt(&committee_id, "N-1", "2025-06-10", 100.0)
        .await;

    let res = app
        .admin(Method::GET, "/api/v1/notifications?limit=5", None)
        .await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.text);
    assert_eq!(res.json["success"], true);
}

#[tokio::test]
async fn system_stats_and_backup() {
    let app = TestApp::new().await;
    app.create_committee("Tuni", "TUNI-AMC").await;

    let stats = app.admin(Method::GET, "/api/v1/system/stats", None).await;
    assert_eq!(stats.status, StatusCode::OK, "{}", stats.text);

    let backup = app.admin(Method::GET, "/api/v1/system/backup", None).await;
    assert_eq!(backup.status, StatusCode::OK, "{}", backup.text);
    let disposition = backup.headers[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.contains("amc-backup-"));
    assert_eq!(backup.json["metadata"]["checksum"].as_str().map(str::len), Some(64));
}

#[tokio::test]
async fn config_values_are_type_checked() {
    let app = TestApp::new().await;

    let ok = app
        .admin(
            Method::PUT,
            "/api/v1/system/config/low_performance_threshold",
            Some(json!({ "value": "45", "dataType": "NUMBER", "category": "alerts" })),
        )
        .await;
    assert_eq!(ok.status, StatusCode::OK, "{}", ok.text);

    let bad = app
        .admin(
            Method::PUT,
            "/api/v1/system/config/low_performance_threshold",
            Some(json!({ "value": "forty", "dataType": "NUMBER", "category": "alerts" })),
        )
        .await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);

    let listed = app.admin(Method::GET, "/api/v1/system/config", None).await;
    assert!(listed.text.contains("low_performance_threshold"));
}

#[tokio::test]
async fn search_reports_next_page_only_when_rows_remain() {
    let app = TestApp::new().await;
    app.create_committee("Pithapuram", "PTM-AMC").await;
    app.create_committee("Pithapuram Rural", "PTMR-AMC").await;

    let exact = app
        .admin(Method::GET, "/api/v1/search?q=pitha&type=committees&limit=2", None)
        .await;
    assert_eq!(exact.status, StatusCode::OK, "{}", exact.text);
    assert_eq!(exact.json["data"]["totalResults"], 2);
    assert_eq!(exact.json["data"]["pagination"]["hasMore"], false);

    let first = app
        .admin(Method::GET, "/api/v1/search?q=pitha&type=committees&limit=1", None)
        .await;
    assert_eq!(first.json["data"]["totalResults"], 1);
    assert_eq!(first.json["data"]["pagination"]["hasMore"], true);

    let last = app
        .admin(
            Method::GET,
            "/api/v1/search?q=pitha&type=committees&limit=1&page=2",
            None,
        )
        .await;
    assert_eq!(last.json["data"]["totalResults"], 1);
    assert_eq!(last.json["data"]["pagination"]["hasMore"], false);
}

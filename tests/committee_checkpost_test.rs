//! Integration tests for committee and checkpost master data.

mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn committee_crud_round_trip() {
    let app = TestApp::new().await;
    let id = app.create_committee("Karapa", "KRP-AMC").await;

    let fetched = app
        .admin(Method::GET, &format!("/api/v1/committees/{}", id), None)
        .await;
    assert_eq!(fetched.status, StatusCode::OK, "{}", fetched.text);
    assert_eq!(fetched.json["data"]["code"], "KRP-AMC");
    assert_eq!(fetched.json["data"]["hasCheckposts"], false);

    let updated = app
        .admin(
            Method::PUT,
            &format!("/api/v1/committees/{}", id),
            Some(json!({ "name": "Karapa AMC" })),
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK, "{}", updated.text);
    assert_eq!(updated.json["data"]["name"], "Karapa AMC");

    let deleted = app
        .admin(Method::DELETE, &format!("/api/v1/committees/{}", id), None)
        .await;
    assert_eq!(deleted.status, StatusCode::OK, "{}", deleted.text);

    let gone = app
        .admin(Method::GET, &format!("/api/v1/committees/{}", id), None)
        .await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn committee_codes_are_unique() {
    let app = TestApp::new().await;
    app.create_committee("Tuni", "TUNI-AMC").await;

    let dup = app
        .admin(
            Method::POST,
            "/api/v1/committees",
            Some(json!({ "name": "Tuni Again", "code": "TUNI-AMC" })),
        )
        .await;
    assert_eq!(dup.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn committee_list_is_paginated_and_searchable() {
    let app = TestApp::new().await;
    app.create_committee("Karapa", "KRP-AMC").await;
    app.create_committee("Tuni", "TUNI-AMC").await;
    app.create_committee("Pithapuram", "PTM-AMC").await;

    let page = app
        .admin(Method::GET, "/api/v1/committees?page=1&limit=2", None)
        .await;
    assert_eq!(page.status, StatusCode::OK, "{}", page.text);
    assert_eq!(page.json["data"].as_array().map(Vec::len), Some(2));
    assert_eq!(page.json["pagination"]["total"], 3);
    assert_eq!(page.json["pagination"]["totalPages"], 2);
    assert_eq!(page.json["pagination"]["hasNext"], true);

    let search = app
        .admin(Method::GET, "/api/v1/committees?search=tuni", None)
        .await;
    assert_eq!(search.json["data"].as_array().map(Vec::len), Some(1));
    assert_eq!(search.json["data"][0]["code"], "TUNI-AMC");
}

#[tokio::test]
async fn creating_a_checkpost_marks_committee() {
    let app = TestApp::new().await;
    let committee_id = app.create_committee("Jaggampeta", "JPT-AMC").await;
    let checkpost_id = app.create_checkpost(&committee_id, "Rajupalem").await;

    let committee = app
        .admin(Method::GET, &format!("/api/v1/committees/{}", committee_id), None)
        .await;
    assert_eq!(committee.json["data"]["hasCheckposts"], true);

    let listed = app
        .admin(
            Method::GET,
            &format!("/api/v1/checkposts?committeeId={}", committee_id),
            None,
        )
        .await;
    assert_eq!(listed.status, StatusCode::OK, "{}", listed.text);
    assert_eq!(listed.json["data"][0]["id"], checkpost_id.as_str());

    let dup = app
        .admin(
            Method::POST,
            "/api/v1/checkposts",
            Some(json!({ "name": "Rajupalem", "committeeId": committee_id })),
        )
        .await;
    assert_eq!(dup.status, StatusCode::CONFLICT);

    let deleted = app
        .admin(Method::DELETE, &format!("/api/v1/checkposts/{}", checkpost_id), None)
        .await;
    assert_eq!(deleted.status, StatusCode::OK, "{}", deleted.text);
}

#[tokio::test]
async fn checkpost_requires_existing_committee() {
    let app = TestApp::new().await;

    let res = app
        .admin(
            Method::POST,
            "/api/v1/checkposts",
            Some(json!({
                "name": "Nowhere",
                "committeeId": "00000000-0000-0000-0000-000000000000"
            })),
        )
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

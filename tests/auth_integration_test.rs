//! Integration tests for authentication and role gates.
//!
//! Tests cover:
//! - Login, profile and logout
//! - Registration rules for privileged roles
//! - Missing and invalid token rejection
//! - Role-based access to write and admin endpoints

mod common;

use amc_market_fees::entities::Role;
use axum::http::{Method, StatusCode};
use common::{TestApp, ADMIN_PASSWORD};
use serde_json::json;

#[tokio::test]
async fn login_returns_token_and_profile() {
    let app = TestApp::new().await;

    let res = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            Some(json!({ "email": "ADMIN@amc.test", "password": ADMIN_PASSWORD })),
            None,
        )
        .await;

    assert_eq!(res.status, StatusCode::OK, "{}", res.text);
    assert_eq!(res.json["success"], true);
    assert_eq!(res.json["message"], "Login successful");
    assert!(res.json["data"]["token"].as_str().is_some());
    assert_eq!(res.json["data"]["user"]["email"], "admin@amc.test");
    assert_eq!(res.json["data"]["user"]["role"], "ADMIN");

    let token = res.json["data"]["token"].as_str().unwrap().to_string();
    let me = app
        .request(Method::GET, "/api/v1/auth/me", None, Some(&token))
        .await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.json["data"]["email"], "admin@amc.test");
    assert!(me.json["data"]["lastLogin"].is_string());
}

#[tokio::test]
async fn login_with_wrong_password_is_unauthorized() {
    let app = TestApp::new().await;

    let res = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            Some(json!({ "email": "admin@amc.test", "password": "wrong-password" })),
            None,
        )
        .await;

    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.json["success"], false);
}

#[tokio::test]
async fn login_rejects_malformed_email() {
    let app = TestApp::new().await;

    let res = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            Some(json!({ "email": "not-an-email", "password": "x" })),
            None,
        )
        .await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn register_defaults_to_user_role() {
    let app = TestApp::new().await;

    let res = app
        .request(
            Method::POST,
            "/api/v1/auth/register",
            Some(json!({
                "email": "Clerk@AMC.test",
                "name": "Data Entry Clerk",
                "password": "longenough"
            })),
            None,
        )
        .await;

    assert_eq!(res.status, StatusCode::CREATED, "{}", res.text);
    assert_eq!(res.json["data"]["user"]["email"], "clerk@amc.test");
    assert_eq!(res.json["data"]["user"]["role"], "USER");

    let again = app
        .request(
            Method::POST,
            "/api/v1/auth/register",
            Some(json!({
                "email": "clerk@amc.test",
                "name": "Second",
                "password": "longenough"
            })),
            None,
        )
        .await;
    assert_eq!(again.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn register_rejects_short_password() {
    let app = TestApp::new().await;

    let res = app
        .request(
            Method::POST,
            "/api/v1/auth/register",
            Some(json!({ "email": "a@amc.test", "name": "A", "password": "short" })),
            None,
        )
        .await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn privileged_registration_requires_admin() {
    let app = TestApp::new().await;
    let body = json!({
        "email": "manager@amc.test",
        "name": "Manager",
        "password": "longenough",
        "role": "MANAGER"
    });

    let anonymous = app
        .request(Method::POST, "/api/v1/auth/register", Some(body.clone()), None)
        .await;
    assert_eq!(anonymous.status, StatusCode::FORBIDDEN);

    let as_admin = app
        .admin(Method::POST, "/api/v1/auth/register", Some(body))
        .await;
    assert_eq!(as_admin.status, StatusCode::CREATED, "{}", as_admin.text);
    assert_eq!(as_admin.json["data"]["user"]["role"], "MANAGER");
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let app = TestApp::new().await;

    let missing = app.request(Method::GET, "/api/v1/committees", None, None).await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);

    let invalid = app
        .request(Method::GET, "/api/v1/committees", None, Some("invalid_token_here"))
        .await;
    assert_eq!(invalid.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn viewer_can_read_but_not_write_receipts() {
    let app = TestApp::new().await;
    let committee_id = app.create_committee("Karapa", "KRP-AMC").await;
    let viewer = app.token_for("viewer@amc.test", Role::Viewer).await;

    let list = app
        .request(Method::GET, "/api/v1/receipts", None, Some(&viewer))
        .await;
    assert_eq!(list.status, StatusCode::OK);

    let create = app
        .request(
            Method::POST,
            "/api/v1/receipts",
            Some(common::receipt_body(&committee_id, "R-1", "2025-06-10", 500.0)),
            Some(&viewer),
        )
        .await;
    assert_eq!(create.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn only_admins_reach_system_config() {
    let app = TestApp::new().await;
    let manager = app.token_for("mgr@amc.test", Role::Manager).await;

    let denied = app
        .request(Method::GET, "/api/v1/system/config", None, Some(&manager))
        .await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    let allowed = app.admin(Method::GET, "/api/v1/system/config", None).await;
    assert_eq!(allowed.status, StatusCode::OK);
}

#[tokio::test]
async fn logout_succeeds_for_authenticated_user() {
    let app = TestApp::new().await;

    let res = app.admin(Method::POST, "/api/v1/auth/logout", None).await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.text);
    assert_eq!(res.json["success"], true);
}

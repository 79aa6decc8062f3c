#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

use amc_market_fees::{
    auth::{hash_password, AuthService},
    config::AppConfig,
    db,
    entities::{user, Role},
    AppState,
};

pub const ADMIN_PASSWORD: &str = "AdminPass123!";

/// Helper harness for spinning up the application over a throwaway SQLite file.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub admin: user::Model,
    token: String,
    _dir: TempDir,
}

/// Status plus decoded JSON body (or `Value::Null` for non-JSON bodies).
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub text: String,
    pub json: Value,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let db_path = dir.path().join("amc_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "test_secret_key_for_testing_purposes_only_32chars".to_string(),
            "test".to_string(),
        );
        cfg.auto_migrate = true;
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let state = AppState::new(Arc::new(pool), cfg);
        let admin = insert_user(&state, "admin@amc.test", Role::Admin).await;
        let token = state
            .auth
            .issue_token(&admin)
            .expect("issue admin token")
            .token;

        let router = amc_market_fees::app_router(state.clone());

        Self {
            router,
            state,
            admin,
            token,
            _dir: dir,
        }
    }

    /// Access the bearer token for the default admin user.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn auth(&self) -> Arc<AuthService> {
        self.state.auth.clone()
    }

    /// Creates an active account with the given role and returns its bearer token.
    pub async fn token_for(&self, email: &str, role: Role) -> String {
        let account = insert_user(&self.state, email, role).await;
        self.state
            .auth
            .issue_token(&account)
            .expect("issue token")
            .token
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read response body");
        let text = String::from_utf8_lossy(&bytes).to_string();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse {
            status,
            headers,
            text,
            json,
        }
    }

    /// Convenience helper for requests made as the default admin.
    pub async fn admin(&self, method: Method, uri: &str, body: Option<Value>) -> TestResponse {
        self.request(method, uri, body, Some(self.token())).await
    }

    /// Creates a committee through the API and returns its id.
    pub async fn create_committee(&self, name: &str, code: &str) -> String {
        let res = self
            .admin(
                Method::POST,
                "/api/v1/committees",
                Some(json!({ "name": name, "code": code })),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "{}", res.text);
        res.json["data"]["id"].as_str().expect("committee id").to_string()
    }

    /// Creates a checkpost through the API and returns its id.
    pub async fn create_checkpost(&self, committee_id: &str, name: &str) -> String {
        let res = self
            .admin(
                Method::POST,
                "/api/v1/checkposts",
                Some(json!({ "name": name, "committeeId": committee_id })),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "{}", res.text);
        res.json["data"]["id"].as_str().expect("checkpost id").to_string()
    }

    /// Creates an MF receipt collected at the office.
    pub async fn create_receipt(
        &self,
        committee_id: &str,
        receipt_number: &str,
        date: &str,
        market_fee: f64,
    ) -> TestResponse {
        self.admin(
            Method::POST,
            "/api/v1/receipts",
            Some(receipt_body(committee_id, receipt_number, date, market_fee)),
        )
        .await
    }
}

/// JSON body for an office-collected MF receipt in FY 2025-26.
pub fn receipt_body(committee_id: &str, receipt_number: &str, date: &str, market_fee: f64) -> Value {
    json!({
        "bookNumber": "B-1",
        "receiptNumber": receipt_number,
        "date": date,
        "traderName": "Sri Lakshmi Traders",
        "payeeName": "Ramana Rao",
        "commodity": "Paddy",
        "transactionValue": market_fee * 100.0,
        "marketFee": market_fee,
        "natureOfReceipt": "MF",
        "collectionLocation": "OFFICE",
        "committeeId": committee_id,
        "financialYear": "2025-26"
    })
}

async fn insert_user(state: &AppState, email: &str, role: Role) -> user::Model {
    let now = Utc::now();
    user::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        name: Set(format!("{} user", role)),
        password_hash: Set(hash_password(ADMIN_PASSWORD).expect("hash password")),
        role: Set(role),
        is_active: Set(true),
        last_login: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        deleted_at: Set(None),
    }
    .insert(&*state.db)
    .await
    .expect("insert test user")
}

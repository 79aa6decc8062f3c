//! AMC Market Fee API Library
//!
//! Receipt ingestion, collection targets and market-fee statements for the
//! Agricultural Market Committees of a district.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod financial_year;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer};
use utoipa::ToSchema;

use crate::auth::{AuthRouterExt, AuthService, ADMIN_ONLY, MANAGE_ROLES, RECEIPT_WRITE_ROLES};
use crate::services::PageRequest;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub auth: Arc<AuthService>,
    pub services: handlers::AppServices,
}

impl AppState {
    /// Wires the auth service and every domain service over one connection pool.
    pub fn new(db: Arc<DatabaseConnection>, config: config::AppConfig) -> Self {
        let auth = Arc::new(AuthService::new(
            auth::AuthConfig::from(&config),
            db.clone(),
        ));
        let services = handlers::AppServices::new(db.clone(), auth.clone());
        Self {
            db,
            config,
            auth,
            services,
        }
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Page position reported alongside list results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(page: PageRequest, total: u64) -> Self {
        let total_pages = total.div_ceil(page.limit);
        Self {
            page: page.page,
            limit: page.limit,
            total,
            total_pages,
            has_next: page.page < total_pages,
            has_prev: page.page > 1,
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            pagination: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            pagination: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn validation_errors(errors: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some("Validation failed".to_string()),
            errors: Some(errors),
            pagination: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[tokio::test]
    async fn validation_errors_response_includes_metadata() {
        let response = crate::tracing::scope_request_id(
            crate::tracing::RequestId::new("meta-validation"),
            async { ApiResponse::<()>::validation_errors(vec!["missing".into()]) },
        )
        .await;

        assert!(!response.success);
        assert_eq!(response.errors.as_ref().map(Vec::len), Some(1));
        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-validation"));
    }

    #[test]
    fn pagination_flags() {
        let p = Pagination::new(PageRequest::new(2, 10), 25);
        assert_eq!(p.total_pages, 3);
        assert!(p.has_next);
        assert!(p.has_prev);

        let empty = Pagination::new(PageRequest::new(1, 10), 0);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next);
        assert!(!empty.has_prev);
    }

    #[test]
    fn pagination_serializes_camel_case() {
        let json = serde_json::to_value(
            ApiResponse::success(vec![1]).with_pagination(Pagination::new(PageRequest::new(1, 10), 1)),
        )
        .unwrap();
        assert_eq!(json["pagination"]["totalPages"], 1);
        assert_eq!(json["pagination"]["hasNext"], false);
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<axum::Json<ApiResponse<T>>, errors::ServiceError>;

/// Every `/api/v1` route with its authentication and role gates
pub fn api_v1_routes() -> Router<AppState> {
    let public = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/register", post(handlers::auth::register));

    // Any authenticated role may read
    let read = Router::new()
        .route("/auth/me", get(handlers::auth::me))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/committees", get(handlers::committees::list_committees))
        .route("/committees/:id", get(handlers::committees::get_committee))
        .route("/checkposts", get(handlers::checkposts::list_checkposts))
        .route("/receipts", get(handlers::receipts::list_receipts))
        .route("/receipts/export", get(handlers::receipts::export_receipts))
        .route("/receipts/:id", get(handlers::receipts::get_receipt))
        .route("/targets", get(handlers::targets::list_targets))
        .route("/targets/:id", get(handlers::targets::get_target))
        .route("/reports/market-fees", get(handlers::reports::market_fee_report))
        .route("/analytics/dashboard", get(handlers::analytics::dashboard))
        .route("/analytics/trends", get(handlers::analytics::trends))
        .route(
            "/analytics/committee-performance",
            get(handlers::analytics::committee_performance),
        )
        .route("/search", get(handlers::search::search))
        .route("/notifications", get(handlers::notifications::list_notifications))
        .route("/system/stats", get(handlers::system::system_stats))
        .with_auth();

    let receipts_write = Router::new()
        .route("/receipts", post(handlers::receipts::create_receipt))
        .route(
            "/receipts/:id",
            put(handlers::receipts::update_receipt).delete(handlers::receipts::delete_receipt),
        )
        .route("/receipts/bulk", post(handlers::receipts::bulk_create_receipts))
        .route(
            "/receipts/bulk/update",
            put(handlers::receipts::bulk_update_receipts),
        )
        .route("/receipts/import", post(handlers::receipts::import_receipts))
        .with_roles(RECEIPT_WRITE_ROLES);

    let manage = Router::new()
        .route("/committees", post(handlers::committees::create_committee))
        .route("/committees/:id", put(handlers::committees::update_committee))
        .route("/checkposts", post(handlers::checkposts::create_checkpost))
        .route("/targets", post(handlers::targets::create_target))
        .route(
            "/targets/:id",
            put(handlers::targets::update_target).delete(handlers::targets::delete_target),
        )
        .with_roles(MANAGE_ROLES);

    let admin = Router::new()
        .route("/committees/:id", delete(handlers::committees::delete_committee))
        .route("/checkposts/:id", delete(handlers::checkposts::delete_checkpost))
        .route("/system/backup", get(handlers::system::download_backup))
        .route("/system/config", get(handlers::system::list_config))
        .route("/system/config/:key", put(handlers::system::upsert_config))
        .with_roles(ADMIN_ONLY);

    Router::new()
        .merge(public)
        .merge(read)
        .merge(receipts_write)
        .merge(manage)
        .merge(admin)
}

/// The versioned API with auth injection, request ids, timeout and body limit.
/// Tracing, compression and CORS are added by the server binary.
pub fn app_router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.request_timeout_secs);
    let body_limit = state.config.max_body_size;
    let auth = state.auth.clone();

    Router::new()
        .nest("/api/v1", api_v1_routes())
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TimeoutLayer::new(timeout))
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        // Inject AuthService into request extensions for auth middleware
        .layer(axum::middleware::from_fn_with_state(
            auth,
            |axum::extract::State(auth): axum::extract::State<Arc<AuthService>>,
             mut req: axum::http::Request<axum::body::Body>,
             next: axum::middleware::Next| async move {
                req.extensions_mut().insert(auth);
                next.run(req).await
            },
        ))
}

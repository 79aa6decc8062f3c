use crate::{services::system::EntityCounts, AppState};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::{IntoParams, ToSchema};

/// Component health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseHealth {
    pub status: ComponentStatus,
    pub response_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub timestamp: String,
    pub database: DatabaseHealth,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counts: Option<EntityCounts>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct HealthQuery {
    /// Include entity counts, uptime and version
    #[serde(default)]
    pub detailed: bool,
}

#[utoipa::path(
    get,
    path = "/api/v1/health",
    summary = "Health check",
    description = "Pings the database; `detailed=true` adds entity counts, uptime and version",
    params(HealthQuery),
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check(
    State(state): State<AppState>,
    Query(query): Query<HealthQuery>,
) -> impl IntoResponse {
    let started = std::time::Instant::now();
    let ping = crate::db::check_connection(&state.db).await;
    let response_time_ms = started.elapsed().as_millis() as u64;

    let (status, database) = match ping {
        Ok(_) => (
            ComponentStatus::Healthy,
            DatabaseHealth {
                status: ComponentStatus::Healthy,
                response_time_ms,
                error: None,
            },
        ),
        Err(e) => {
            warn!(error = %e, "database health check failed");
            (
                ComponentStatus::Unhealthy,
                DatabaseHealth {
                    status: ComponentStatus::Unhealthy,
                    response_time_ms,
                    error: Some("Database connection failed".to_string()),
                },
            )
        }
    };

    let mut body = HealthResponse {
        status,
        timestamp: chrono::Utc::now().to_rfc3339(),
        database,
        version: None,
        uptime_seconds: None,
        counts: None,
    };

    if query.detailed {
        body.version = Some(env!("CARGO_PKG_VERSION").to_string());
        body.uptime_seconds = Some(state.services.system.uptime_seconds());
        if status == ComponentStatus::Healthy {
            body.counts = state.services.system.entity_counts().await.ok();
        }
    }

    let code = match status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (code, Json(body))
}

use crate::{
    auth::AuthUser,
    errors::ServiceError,
    middleware_helpers::ClientInfo,
    services::{
        system::{Backup, ConfigEntry, SystemStats, UpsertConfigRequest},
        Actor,
    },
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use tracing::info;
use utoipa::IntoParams;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct BackupParams {
    /// Include the audit trail in the snapshot
    #[serde(default)]
    pub include_audit_logs: bool,
}

#[utoipa::path(
    get,
    path = "/api/v1/system/stats",
    summary = "System statistics",
    responses(
        (status = 200, description = "Entity counts, last-24-hour activity and process info", body = ApiResponse<SystemStats>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "system"
)]
pub async fn system_stats(State(state): State<AppState>, user: AuthUser) -> ApiResult<SystemStats> {
    let stats = state.services.system.stats(user.user_id).await?;
    Ok(Json(ApiResponse::success(stats)))
}

#[utoipa::path(
    get,
    path = "/api/v1/system/backup",
    summary = "Download a backup",
    description = "JSON snapshot of every active row with a SHA-256 checksum, served as an attachment",
    params(BackupParams),
    responses(
        (status = 200, description = "Backup document", body = Backup),
        (status = 403, description = "Administrators only", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "system"
)]
pub async fn download_backup(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<BackupParams>,
) -> Result<Response, ServiceError> {
    let backup = state
        .services
        .system
        .backup(user.user_id, params.include_audit_logs)
        .await?;
    let file_name = backup.file_name();
    info!(user_id = %user.user_id, file = %file_name, "backup downloaded");
    Ok((
        [(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", file_name),
        )],
        Json(backup),
    )
        .into_response())
}

#[utoipa::path(
    get,
    path = "/api/v1/system/config",
    summary = "List configuration",
    responses(
        (status = 200, description = "Configuration entries by category", body = ApiResponse<Vec<ConfigEntry>>),
        (status = 403, description = "Administrators only", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "system"
)]
pub async fn list_config(State(state): State<AppState>) -> ApiResult<Vec<ConfigEntry>> {
    let entries = state.services.system.list_config().await?;
    Ok(Json(ApiResponse::success(entries)))
}

#[utoipa::path(
    put,
    path = "/api/v1/system/config/{key}",
    summary = "Set a configuration value",
    params(("key" = String, Path, description = "Configuration key")),
    request_body = UpsertConfigRequest,
    responses(
        (status = 200, description = "Configuration saved", body = ApiResponse<ConfigEntry>),
        (status = 400, description = "Value does not match its data type", body = crate::errors::ErrorResponse),
        (status = 403, description = "Administrators only", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "system"
)]
pub async fn upsert_config(
    State(state): State<AppState>,
    Path(key): Path<String>,
    user: AuthUser,
    client: ClientInfo,
    Json(payload): Json<UpsertConfigRequest>,
) -> ApiResult<ConfigEntry> {
    let entry = state
        .services
        .system
        .upsert_config(&key, payload, &Actor::new(&user, client))
        .await?;
    Ok(Json(
        ApiResponse::success(entry).with_message("Configuration updated successfully"),
    ))
}

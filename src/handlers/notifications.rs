use crate::{services::notifications::NotificationFeed, ApiResponse, ApiResult, AppState};
use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

const DEFAULT_LIMIT: u64 = 10;
const MAX_LIMIT: u64 = 50;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct NotificationParams {
    /// Maximum notifications returned (default 10)
    pub limit: Option<u64>,
}

#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    summary = "Activity feed",
    description = "Recent receipts, low-performance alerts, target changes and system alerts, newest first",
    params(NotificationParams),
    responses(
        (status = 200, description = "Notifications", body = ApiResponse<NotificationFeed>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "notifications"
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    Query(params): Query<NotificationParams>,
) -> ApiResult<NotificationFeed> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let feed = state.services.notifications.feed(limit).await?;
    Ok(Json(ApiResponse::success(feed)))
}

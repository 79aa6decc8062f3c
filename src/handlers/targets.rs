use crate::{
    auth::AuthUser,
    errors::ServiceError,
    handlers::common::{created, paginated, PaginationParams},
    middleware_helpers::ClientInfo,
    services::{
        targets::{CreateTargetRequest, TargetFilter, TargetView, UpdateTargetRequest},
        Actor,
    },
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct TargetListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub committee_id: Option<Uuid>,
    /// e.g. 2025-26
    pub financial_year: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/targets",
    summary = "List targets",
    description = "Targets with monthly and checkpost breakdowns, newest financial year first",
    params(TargetListQuery),
    responses(
        (status = 200, description = "Targets retrieved", body = ApiResponse<Vec<TargetView>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "targets"
)]
pub async fn list_targets(
    State(state): State<AppState>,
    Query(query): Query<TargetListQuery>,
) -> ApiResult<Vec<TargetView>> {
    let page = PaginationParams::new(query.page, query.limit).page_request(&state.config)?;
    let filter = TargetFilter {
        committee_id: query.committee_id,
        financial_year: query.financial_year.filter(|fy| !fy.trim().is_empty()),
    };
    let targets = state.services.targets.list(&filter, page).await?;
    Ok(paginated(targets, page))
}

#[utoipa::path(
    get,
    path = "/api/v1/targets/{id}",
    summary = "Get target",
    params(("id" = Uuid, Path, description = "Target ID")),
    responses(
        (status = 200, description = "Target with breakdowns", body = ApiResponse<TargetView>),
        (status = 404, description = "Target not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "targets"
)]
pub async fn get_target(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<TargetView> {
    let target = state.services.targets.get(id).await?;
    Ok(Json(ApiResponse::success(target)))
}

#[utoipa::path(
    post,
    path = "/api/v1/targets",
    summary = "Create target",
    request_body = CreateTargetRequest,
    responses(
        (status = 201, description = "Target created", body = ApiResponse<TargetView>),
        (status = 400, description = "Validation failed", body = crate::errors::ErrorResponse),
        (status = 404, description = "Committee not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Target already exists for the committee and year", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "targets"
)]
pub async fn create_target(
    State(state): State<AppState>,
    user: AuthUser,
    client: ClientInfo,
    Json(payload): Json<CreateTargetRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TargetView>>), ServiceError> {
    let target = state
        .services
        .targets
        .create(payload, &Actor::new(&user, client))
        .await?;
    Ok(created(target, "Target created successfully"))
}

#[utoipa::path(
    put,
    path = "/api/v1/targets/{id}",
    summary = "Update target",
    description = "A supplied monthly or checkpost breakdown replaces the stored one",
    params(("id" = Uuid, Path, description = "Target ID")),
    request_body = UpdateTargetRequest,
    responses(
        (status = 200, description = "Target updated", body = ApiResponse<TargetView>),
        (status = 400, description = "Validation failed", body = crate::errors::ErrorResponse),
        (status = 404, description = "Target not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "targets"
)]
pub async fn update_target(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    user: AuthUser,
    client: ClientInfo,
    Json(payload): Json<UpdateTargetRequest>,
) -> ApiResult<TargetView> {
    let target = state
        .services
        .targets
        .update(id, payload, &Actor::new(&user, client))
        .await?;
    Ok(Json(
        ApiResponse::success(target).with_message("Target updated successfully"),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/v1/targets/{id}",
    summary = "Delete target",
    params(("id" = Uuid, Path, description = "Target ID")),
    responses(
        (status = 200, description = "Target deleted"),
        (status = 404, description = "Target not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "targets"
)]
pub async fn delete_target(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    user: AuthUser,
    client: ClientInfo,
) -> ApiResult<()> {
    state
        .services
        .targets
        .delete(id, &Actor::new(&user, client))
        .await?;
    Ok(Json(ApiResponse::success(()).with_message("Target deleted successfully")))
}

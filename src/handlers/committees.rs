use crate::{
    auth::AuthUser,
    errors::ServiceError,
    handlers::common::{created, paginated, PaginationParams},
    middleware_helpers::ClientInfo,
    services::{
        committees::{CommitteeDetail, CommitteeView, CreateCommitteeRequest, UpdateCommitteeRequest},
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
pub struct CommitteeListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    /// Case-insensitive match on name or code
    pub search: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/committees",
    summary = "List committees",
    description = "Active committees ordered by name, each with its checkposts and record counts",
    params(CommitteeListQuery),
    responses(
        (status = 200, description = "Committees retrieved", body = ApiResponse<Vec<CommitteeView>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "committees"
)]
pub async fn list_committees(
    State(state): State<AppState>,
    Query(query): Query<CommitteeListQuery>,
) -> ApiResult<Vec<CommitteeView>> {
    let page = PaginationParams::new(query.page, query.limit).page_request(&state.config)?;
    let committees = state.services.committees.list(page, query.search).await?;
    Ok(paginated(committees, page))
}

#[utoipa::path(
    get,
    path = "/api/v1/committees/{id}",
    summary = "Get committee",
    params(("id" = Uuid, Path, description = "Committee ID")),
    responses(
        (status = 200, description = "Committee with checkposts and targets", body = ApiResponse<CommitteeDetail>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Committee not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "committees"
)]
pub async fn get_committee(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<CommitteeDetail> {
    let committee = state.services.committees.get(id).await?;
    Ok(Json(ApiResponse::success(committee)))
}

#[utoipa::path(
    post,
    path = "/api/v1/committees",
    summary = "Create committee",
    request_body = CreateCommitteeRequest,
    responses(
        (status = 201, description = "Committee created", body = ApiResponse<CommitteeView>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 409, description = "Committee code already in use", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "committees"
)]
pub async fn create_committee(
    State(state): State<AppState>,
    user: AuthUser,
    client: ClientInfo,
    Json(payload): Json<CreateCommitteeRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CommitteeView>>), ServiceError> {
    let committee = state
        .services
        .committees
        .create(payload, &Actor::new(&user, client))
        .await?;
    Ok(created(committee, "Committee created successfully"))
}

#[utoipa::path(
    put,
    path = "/api/v1/committees/{id}",
    summary = "Update committee",
    params(("id" = Uuid, Path, description = "Committee ID")),
    request_body = UpdateCommitteeRequest,
    responses(
        (status = 200, description = "Committee updated", body = ApiResponse<CommitteeView>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 404, description = "Committee not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Committee code already in use", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "committees"
)]
pub async fn update_committee(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    user: AuthUser,
    client: ClientInfo,
    Json(payload): Json<UpdateCommitteeRequest>,
) -> ApiResult<CommitteeView> {
    let committee = state
        .services
        .committees
        .update(id, payload, &Actor::new(&user, client))
        .await?;
    Ok(Json(
        ApiResponse::success(committee).with_message("Committee updated successfully"),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/v1/committees/{id}",
    summary = "Delete committee",
    description = "Soft delete; the committee disappears from every listing",
    params(("id" = Uuid, Path, description = "Committee ID")),
    responses(
        (status = 200, description = "Committee deleted"),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Committee not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "committees"
)]
pub async fn delete_committee(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    user: AuthUser,
    client: ClientInfo,
) -> ApiResult<()> {
    state
        .services
        .committees
        .delete(id, &Actor::new(&user, client))
        .await?;
    Ok(Json(ApiResponse::success(()).with_message("Committee deleted successfully")))
}

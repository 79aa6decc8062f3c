use crate::{
    auth::AuthUser,
    errors::ServiceError,
    handlers::common::created,
    middleware_helpers::ClientInfo,
    services::{
        checkposts::{CheckpostView, CheckpostWithCommittee, CreateCheckpostRequest},
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
pub struct CheckpostListQuery {
    pub committee_id: Option<Uuid>,
}

#[utoipa::path(
    get,
    path = "/api/v1/checkposts",
    summary = "List checkposts",
    params(CheckpostListQuery),
    responses(
        (status = 200, description = "Active checkposts with their committee", body = ApiResponse<Vec<CheckpostWithCommittee>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "checkposts"
)]
pub async fn list_checkposts(
    State(state): State<AppState>,
    Query(query): Query<CheckpostListQuery>,
) -> ApiResult<Vec<CheckpostWithCommittee>> {
    let checkposts = state.services.checkposts.list(query.committee_id).await?;
    Ok(Json(ApiResponse::success(checkposts)))
}

#[utoipa::path(
    post,
    path = "/api/v1/checkposts",
    summary = "Create checkpost",
    request_body = CreateCheckpostRequest,
    responses(
        (status = 201, description = "Checkpost created", body = ApiResponse<CheckpostView>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 404, description = "Committee not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Checkpost name already used in the committee", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "checkposts"
)]
pub async fn create_checkpost(
    State(state): State<AppState>,
    user: AuthUser,
    client: ClientInfo,
    Json(payload): Json<CreateCheckpostRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CheckpostView>>), ServiceError> {
    let checkpost = state
        .services
        .checkposts
        .create(payload, &Actor::new(&user, client))
        .await?;
    Ok(created(checkpost, "Checkpost created successfully"))
}

#[utoipa::path(
    delete,
    path = "/api/v1/checkposts/{id}",
    summary = "Delete checkpost",
    params(("id" = Uuid, Path, description = "Checkpost ID")),
    responses(
        (status = 200, description = "Checkpost deleted"),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Checkpost not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "checkposts"
)]
pub async fn delete_checkpost(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    user: AuthUser,
    client: ClientInfo,
) -> ApiResult<()> {
    state
        .services
        .checkposts
        .delete(id, &Actor::new(&user, client))
        .await?;
    Ok(Json(ApiResponse::success(()).with_message("Checkpost deleted successfully")))
}

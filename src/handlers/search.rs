use crate::{
    errors::ServiceError,
    services::{
        search::{SearchResults, SearchType},
        PageRequest,
    },
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

const DEFAULT_LIMIT: u64 = 10;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct SearchParams {
    /// At least two characters
    pub q: Option<String>,
    /// all (default), receipts, committees or checkposts
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[utoipa::path(
    get,
    path = "/api/v1/search",
    summary = "Global search",
    description = "`type=all` returns up to five hits per type; a single type pages through its hits",
    params(SearchParams),
    responses(
        (status = 200, description = "Search results", body = ApiResponse<SearchResults>),
        (status = 400, description = "Query too short or unknown type", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "search"
)]
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<SearchResults> {
    let kind = match params.kind.as_deref().filter(|k| !k.trim().is_empty()) {
        Some(value) => SearchType::parse(value).ok_or_else(|| {
            ServiceError::ValidationError(
                "type must be one of all, receipts, committees, checkposts".to_string(),
            )
        })?,
        None => SearchType::All,
    };
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LIMIT)
        .clamp(1, state.config.api_max_page_size.max(1));
    let page = PageRequest::new(params.page.unwrap_or(1), limit);
    let results = state
        .services
        .search
        .search(params.q.as_deref().unwrap_or_default(), kind, page)
        .await?;
    Ok(Json(ApiResponse::success(results)))
}

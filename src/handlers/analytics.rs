use crate::{
    errors::ServiceError,
    handlers::common::{financial_year_or_current, optional_financial_year},
    services::analytics::{Dashboard, PerformanceReport, TrendPeriod, Trends},
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsParams {
    /// Defaults to the financial year containing today
    pub financial_year: Option<String>,
    pub committee_id: Option<Uuid>,
    /// Trends only: monthly (default), quarterly or yearly
    pub period: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/analytics/dashboard",
    summary = "Dashboard",
    description = "Overview totals, committee performance, month-by-month comparison with the previous year and the latest receipts",
    params(AnalyticsParams),
    responses(
        (status = 200, description = "Dashboard computed", body = ApiResponse<Dashboard>),
        (status = 400, description = "Invalid financial year", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "analytics"
)]
pub async fn dashboard(
    State(state): State<AppState>,
    Query(params): Query<AnalyticsParams>,
) -> ApiResult<Dashboard> {
    let fy = financial_year_or_current(params.financial_year.as_deref())?;
    let dashboard = state.services.analytics.dashboard(fy).await?;
    Ok(Json(ApiResponse::success(dashboard)))
}

#[utoipa::path(
    get,
    path = "/api/v1/analytics/trends",
    summary = "Collection trends",
    params(AnalyticsParams),
    responses(
        (status = 200, description = "Trends computed", body = ApiResponse<Trends>),
        (status = 400, description = "Invalid period or financial year", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "analytics"
)]
pub async fn trends(
    State(state): State<AppState>,
    Query(params): Query<AnalyticsParams>,
) -> ApiResult<Trends> {
    let period = match params.period.as_deref().filter(|p| !p.trim().is_empty()) {
        Some(value) => TrendPeriod::parse(value).ok_or_else(|| {
            ServiceError::ValidationError(
                "period must be one of monthly, quarterly, yearly".to_string(),
            )
        })?,
        None => TrendPeriod::default(),
    };
    let fy = optional_financial_year(params.financial_year.as_deref())?;
    let trends = state
        .services
        .analytics
        .trends(period, fy, params.committee_id)
        .await?;
    Ok(Json(ApiResponse::success(trends)))
}

#[utoipa::path(
    get,
    path = "/api/v1/analytics/committee-performance",
    summary = "Committee performance",
    description = "With `committeeId`, that committee's monthly, checkpost and commodity detail; otherwise every committee ranked by achievement",
    params(AnalyticsParams),
    responses(
        (status = 200, description = "Performance computed", body = ApiResponse<PerformanceReport>),
        (status = 404, description = "Committee not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "analytics"
)]
pub async fn committee_performance(
    State(state): State<AppState>,
    Query(params): Query<AnalyticsParams>,
) -> ApiResult<PerformanceReport> {
    let fy = financial_year_or_current(params.financial_year.as_deref())?;
    let report = state
        .services
        .analytics
        .committee_performance(fy, params.committee_id)
        .await?;
    Ok(Json(ApiResponse::success(report)))
}

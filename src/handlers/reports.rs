use crate::{
    errors::ServiceError,
    financial_year::{FinancialMonth, FinancialYear},
    services::reports::{MarketFeeReport, ReportKind, ReportQuery},
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
pub struct MarketFeeReportParams {
    /// e.g. 2025-26
    pub financial_year: Option<String>,
    /// Financial month, e.g. JUNE or June
    pub month: Option<String>,
    pub committee_id: Option<Uuid>,
    /// statement1, statement2, commodity or all (default)
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl MarketFeeReportParams {
    fn query(&self) -> Result<ReportQuery, ServiceError> {
        let (Some(fy), Some(month)) = (
            self.financial_year.as_deref().filter(|v| !v.trim().is_empty()),
            self.month.as_deref().filter(|v| !v.trim().is_empty()),
        ) else {
            return Err(ServiceError::ValidationError(
                "financialYear and month are required".to_string(),
            ));
        };
        let kind = match self.kind.as_deref().filter(|v| !v.trim().is_empty()) {
            Some(value) => ReportKind::parse(value).ok_or_else(|| {
                ServiceError::ValidationError(
                    "type must be one of statement1, statement2, commodity, all".to_string(),
                )
            })?,
            None => ReportKind::All,
        };
        Ok(ReportQuery {
            financial_year: FinancialYear::parse(fy)?,
            month: month.parse::<FinancialMonth>()?,
            committee_id: self.committee_id,
            kind,
        })
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/market-fees",
    summary = "Market fee statements",
    description = "Committee-wise and checkpost-wise comparison against the previous year and targets, plus the commodity statement. Amounts are in lakhs.",
    params(MarketFeeReportParams),
    responses(
        (status = 200, description = "Report generated", body = ApiResponse<MarketFeeReport>),
        (status = 400, description = "Missing or invalid parameters", body = crate::errors::ErrorResponse),
        (status = 404, description = "Committee not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "reports"
)]
pub async fn market_fee_report(
    State(state): State<AppState>,
    Query(params): Query<MarketFeeReportParams>,
) -> ApiResult<MarketFeeReport> {
    let report = state.services.reports.market_fees(params.query()?).await?;
    Ok(Json(ApiResponse::success(report)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn both_year_and_month_are_required() {
        let params = MarketFeeReportParams {
            financial_year: Some("2025-26".into()),
            ..Default::default()
        };
        assert_matches!(params.query(), Err(ServiceError::ValidationError(_)));
    }

    #[test]
    fn parses_month_names_and_type() {
        let params = MarketFeeReportParams {
            financial_year: Some("2025-26".into()),
            month: Some("June".into()),
            committee_id: None,
            kind: Some("statement2".into()),
        };
        let query = params.query().unwrap();
        assert_eq!(query.month, FinancialMonth::June);
        assert_eq!(query.kind, ReportKind::Statement2);
        assert_eq!(query.financial_year, FinancialYear::new(2025));
    }
}

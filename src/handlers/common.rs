use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::financial_year::FinancialYear;
use crate::services::{PageRequest, Paged};
use crate::{ApiResponse, Pagination};
use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::IntoParams;

/// Pagination parameters for list operations
#[derive(Debug, Default, Deserialize, Serialize, IntoParams)]
pub struct PaginationParams {
    /// Page number (default: 1)
    pub page: Option<u64>,
    /// Items per page (default from configuration, capped at the configured maximum)
    pub limit: Option<u64>,
}

impl PaginationParams {
    pub fn new(page: Option<u64>, limit: Option<u64>) -> Self {
        Self { page, limit }
    }

    pub fn page_request(&self, config: &AppConfig) -> Result<PageRequest, ServiceError> {
        let limit = self
            .limit
            .unwrap_or(config.api_default_page_size)
            .clamp(1, config.api_max_page_size.max(1));
        let page = PageRequest::new(self.page.unwrap_or(1), limit);
        page.offset()?;
        Ok(page)
    }
}

/// Wraps a page of results in the standard envelope
pub fn paginated<T>(paged: Paged<T>, page: PageRequest) -> Json<ApiResponse<Vec<T>>> {
    Json(ApiResponse::success(paged.items).with_pagination(Pagination::new(page, paged.total)))
}

/// Standard created response
pub fn created<T>(data: T, message: &str) -> (StatusCode, Json<ApiResponse<T>>) {
    (
        StatusCode::CREATED,
        Json(ApiResponse::success(data).with_message(message)),
    )
}

/// Parses an optional financial-year query value, defaulting to the current year
pub fn financial_year_or_current(value: Option<&str>) -> Result<FinancialYear, ServiceError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(label) => Ok(FinancialYear::parse(label)?),
        None => Ok(FinancialYear::current()),
    }
}

/// Parses an optional financial-year query value
pub fn optional_financial_year(value: Option<&str>) -> Result<Option<FinancialYear>, ServiceError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(FinancialYear::parse)
        .transpose()
        .map_err(ServiceError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        AppConfig::new(
            "sqlite::memory:".into(),
            "k".repeat(64),
            "test".into(),
        )
    }

    #[test]
    fn limit_is_defaulted_and_capped() {
        let cfg = config();
        let defaulted = PaginationParams::default().page_request(&cfg).unwrap();
        assert_eq!(defaulted.page, 1);
        assert_eq!(defaulted.limit, cfg.api_default_page_size);

        let capped = PaginationParams {
            page: Some(0),
            limit: Some(10_000),
        }
        .page_request(&cfg)
        .unwrap();
        assert_eq!(capped.page, 1);
        assert_eq!(capped.limit, cfg.api_max_page_size);
    }

    #[test]
    fn unreachable_page_is_rejected() {
        let cfg = config();
        let err = PaginationParams::new(Some(u64::MAX), Some(10))
            .page_request(&cfg)
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn financial_year_parameters() {
        assert_eq!(
            financial_year_or_current(Some("2024-25")).unwrap(),
            FinancialYear::new(2024)
        );
        assert_eq!(financial_year_or_current(None).unwrap(), FinancialYear::current());
        assert!(optional_financial_year(Some("2024-26")).is_err());
        assert_eq!(optional_financial_year(Some("  ")).unwrap(), None);
    }
}

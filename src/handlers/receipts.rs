use crate::{
    auth::AuthUser,
    errors::ServiceError,
    handlers::common::{created, paginated, PaginationParams},
    middleware_helpers::ClientInfo,
    services::{
        export::{self, DocumentOptions, ReceiptColumn, DEFAULT_CHUNK_SIZE},
        receipts::{
            parse_date_bound, parse_nature, BulkUpdateItem, ImportOutcome, ImportReceiptRow,
            ReceiptFilter, ReceiptPayload, ReceiptSortField, ReceiptView, UpdateReceiptRequest,
        },
        Actor,
    },
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

/// Filters accepted by listing and export
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    /// Matches receipt number, trader, payee or commodity
    pub search: Option<String>,
    /// RFC 3339 or YYYY-MM-DD, inclusive
    pub start_date: Option<String>,
    /// RFC 3339 or YYYY-MM-DD, inclusive
    pub end_date: Option<String>,
    pub financial_year: Option<String>,
    pub committee_id: Option<Uuid>,
    pub checkpost_id: Option<Uuid>,
    /// MF or OTHERS
    pub nature_of_receipt: Option<String>,
    /// date, receiptNumber, marketFee, transactionValue, traderName or createdAt
    pub sort_by: Option<String>,
    /// asc or desc (default desc)
    pub sort_order: Option<String>,
    /// Export only: json, csv or document
    pub format: Option<String>,
    /// Export only: comma separated column keys
    pub columns: Option<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl ReceiptQuery {
    fn filter(&self) -> Result<ReceiptFilter, ServiceError> {
        let bound = |value: &Option<String>, name: &str, upper: bool| {
            present(value)
                .map(|v| {
                    parse_date_bound(v, upper)
                        .ok_or_else(|| ServiceError::ValidationError(format!("Invalid {}", name)))
                })
                .transpose()
        };
        let nature_of_receipt = present(&self.nature_of_receipt)
            .map(|v| {
                parse_nature(v).ok_or_else(|| {
                    ServiceError::ValidationError("natureOfReceipt must be one of MF, OTHERS".to_string())
                })
            })
            .transpose()?;

        Ok(ReceiptFilter {
            search: present(&self.search).map(str::to_string),
            start_date: bound(&self.start_date, "startDate", false)?,
            end_before: bound(&self.end_date, "endDate", true)?,
            financial_year: present(&self.financial_year).map(str::to_string),
            committee_id: self.committee_id,
            checkpost_id: self.checkpost_id,
            nature_of_receipt,
            sort_by: present(&self.sort_by)
                .and_then(ReceiptSortField::parse)
                .unwrap_or_default(),
            ascending: present(&self.sort_order).is_some_and(|o| o.eq_ignore_ascii_case("asc")),
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkCreateRequest {
    pub receipts: Vec<ReceiptPayload>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkUpdateRequest {
    pub updates: Vec<BulkUpdateItem>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    pub receipts: Vec<ImportReceiptRow>,
    #[serde(default)]
    pub validate_only: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReceiptBatch {
    pub receipts: Vec<ReceiptView>,
    pub count: usize,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptExport {
    pub receipts: Vec<ReceiptView>,
    pub count: usize,
    pub exported_at: DateTime<Utc>,
}

#[utoipa::path(
    get,
    path = "/api/v1/receipts",
    summary = "List receipts",
    params(ReceiptQuery),
    responses(
        (status = 200, description = "Receipts retrieved", body = ApiResponse<Vec<ReceiptView>>),
        (status = 400, description = "Invalid filter", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "receipts"
)]
pub async fn list_receipts(
    State(state): State<AppState>,
    Query(query): Query<ReceiptQuery>,
) -> ApiResult<Vec<ReceiptView>> {
    let filter = query.filter()?;
    let page = PaginationParams::new(query.page, query.limit).page_request(&state.config)?;
    let receipts = state.services.receipts.list(&filter, page).await?;
    Ok(paginated(receipts, page))
}

#[utoipa::path(
    get,
    path = "/api/v1/receipts/{id}",
    summary = "Get receipt",
    params(("id" = Uuid, Path, description = "Receipt ID")),
    responses(
        (status = 200, description = "Receipt with committee and checkpost", body = ApiResponse<ReceiptView>),
        (status = 404, description = "Receipt not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "receipts"
)]
pub async fn get_receipt(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ReceiptView> {
    let receipt = state.services.receipts.get(id).await?;
    Ok(Json(ApiResponse::success(receipt)))
}

#[utoipa::path(
    post,
    path = "/api/v1/receipts",
    summary = "Record a receipt",
    request_body = ReceiptPayload,
    responses(
        (status = 201, description = "Receipt created", body = ApiResponse<ReceiptView>),
        (status = 400, description = "Validation failed", body = crate::errors::ErrorResponse),
        (status = 409, description = "Duplicate book and receipt number", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "receipts"
)]
pub async fn create_receipt(
    State(state): State<AppState>,
    user: AuthUser,
    client: ClientInfo,
    Json(payload): Json<ReceiptPayload>,
) -> Result<(StatusCode, Json<ApiResponse<ReceiptView>>), ServiceError> {
    let receipt = state
        .services
        .receipts
        .create(payload, &Actor::new(&user, client))
        .await?;
    Ok(created(receipt, "Receipt created successfully"))
}

#[utoipa::path(
    put,
    path = "/api/v1/receipts/{id}",
    summary = "Update receipt",
    params(("id" = Uuid, Path, description = "Receipt ID")),
    request_body = UpdateReceiptRequest,
    responses(
        (status = 200, description = "Receipt updated", body = ApiResponse<ReceiptView>),
        (status = 400, description = "Validation failed", body = crate::errors::ErrorResponse),
        (status = 404, description = "Receipt not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Duplicate book and receipt number", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "receipts"
)]
pub async fn update_receipt(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    user: AuthUser,
    client: ClientInfo,
    Json(payload): Json<UpdateReceiptRequest>,
) -> ApiResult<ReceiptView> {
    let receipt = state
        .services
        .receipts
        .update(id, payload, &Actor::new(&user, client))
        .await?;
    Ok(Json(
        ApiResponse::success(receipt).with_message("Receipt updated successfully"),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/v1/receipts/{id}",
    summary = "Delete receipt",
    params(("id" = Uuid, Path, description = "Receipt ID")),
    responses(
        (status = 200, description = "Receipt deleted"),
        (status = 404, description = "Receipt not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "receipts"
)]
pub async fn delete_receipt(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    user: AuthUser,
    client: ClientInfo,
) -> ApiResult<()> {
    state
        .services
        .receipts
        .delete(id, &Actor::new(&user, client))
        .await?;
    Ok(Json(ApiResponse::success(()).with_message("Receipt deleted successfully")))
}

#[utoipa::path(
    post,
    path = "/api/v1/receipts/bulk",
    summary = "Create receipts in bulk",
    description = "1 to 100 receipts in one transaction; any failure rejects the whole batch",
    request_body = BulkCreateRequest,
    responses(
        (status = 201, description = "Receipts created", body = ApiResponse<ReceiptBatch>),
        (status = 400, description = "Row validation failed or duplicate rows in the batch", body = crate::errors::ErrorResponse),
        (status = 409, description = "Receipts already exist", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "receipts"
)]
pub async fn bulk_create_receipts(
    State(state): State<AppState>,
    user: AuthUser,
    client: ClientInfo,
    Json(payload): Json<BulkCreateRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ReceiptBatch>>), ServiceError> {
    let receipts = state
        .services
        .receipts
        .bulk_create(payload.receipts, &Actor::new(&user, client))
        .await?;
    let count = receipts.len();
    Ok(created(
        ReceiptBatch { receipts, count },
        &format!("{} receipts created successfully", count),
    ))
}

#[utoipa::path(
    put,
    path = "/api/v1/receipts/bulk/update",
    summary = "Update receipts in bulk",
    request_body = BulkUpdateRequest,
    responses(
        (status = 200, description = "Receipts updated", body = ApiResponse<ReceiptBatch>),
        (status = 400, description = "Validation failed", body = crate::errors::ErrorResponse),
        (status = 404, description = "Some receipts were not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "receipts"
)]
pub async fn bulk_update_receipts(
    State(state): State<AppState>,
    user: AuthUser,
    client: ClientInfo,
    Json(payload): Json<BulkUpdateRequest>,
) -> ApiResult<ReceiptBatch> {
    let receipts = state
        .services
        .receipts
        .bulk_update(payload.updates, &Actor::new(&user, client))
        .await?;
    let count = receipts.len();
    Ok(Json(
        ApiResponse::success(ReceiptBatch { receipts, count })
            .with_message(format!("{} receipts updated successfully", count)),
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/receipts/import",
    summary = "Import receipts",
    description = "Rows reference committees by code and checkposts by name. `validateOnly` runs every check without writing.",
    request_body = ImportRequest,
    responses(
        (status = 200, description = "Rows validated", body = ApiResponse<ImportOutcome>),
        (status = 201, description = "Rows imported", body = ApiResponse<ImportOutcome>),
        (status = 400, description = "Validation failed", body = crate::errors::ErrorResponse),
        (status = 409, description = "Receipts already exist", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "receipts"
)]
pub async fn import_receipts(
    State(state): State<AppState>,
    user: AuthUser,
    client: ClientInfo,
    Json(payload): Json<ImportRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ImportOutcome>>), ServiceError> {
    let outcome = state
        .services
        .receipts
        .import(payload.receipts, payload.validate_only, &Actor::new(&user, client))
        .await?;
    Ok(match &outcome {
        ImportOutcome::Validated { message, .. } => {
            let message = message.clone();
            (StatusCode::OK, Json(ApiResponse::success(outcome).with_message(message)))
        }
        ImportOutcome::Imported { count, .. } => {
            let message = format!("{} receipts imported successfully", count);
            created(outcome, &message)
        }
    })
}

#[utoipa::path(
    get,
    path = "/api/v1/receipts/export",
    summary = "Export receipts",
    description = "JSON envelope, quoted CSV, or a paged plain-text document; ordered by date, newest first",
    params(ReceiptQuery),
    responses(
        (status = 200, description = "Export generated", body = ApiResponse<ReceiptExport>),
        (status = 400, description = "Unknown format or column", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "receipts"
)]
pub async fn export_receipts(
    State(state): State<AppState>,
    Query(query): Query<ReceiptQuery>,
) -> Result<Response, ServiceError> {
    let filter = query.filter()?;
    let format = present(&query.format).unwrap_or("json").to_ascii_lowercase();
    if !matches!(format.as_str(), "json" | "csv" | "document") {
        return Err(ServiceError::ValidationError(format!(
            "Unsupported export format '{}'",
            format
        )));
    }
    let columns = ReceiptColumn::parse_selection(present(&query.columns))?;

    let receipts = state.services.receipts.export_rows(&filter).await?;
    let now = Utc::now();
    let stamp = now.format("%Y-%m-%d");

    match format.as_str() {
        "csv" => {
            let table = export::receipt_table(&columns, &receipts);
            let body = export::render_csv(&table, DEFAULT_CHUNK_SIZE).await;
            Ok(attachment(
                "text/csv; charset=utf-8",
                format!("receipts-export-{}.csv", stamp),
                body,
            ))
        }
        "document" => {
            let table = export::receipt_table(&columns, &receipts);
            let mut options = DocumentOptions::new("Market Fee Receipts Report");
            options.subtitle = Some(format!("{} receipts", receipts.len()));
            options.footer_timestamp = Some(now);
            let body = export::render_document(&table, &options);
            Ok(attachment(
                "text/plain; charset=utf-8",
                format!("receipts-report-{}.txt", stamp),
                body,
            ))
        }
        _ => {
            let count = receipts.len();
            Ok(Json(ApiResponse::success(ReceiptExport {
                receipts,
                count,
                exported_at: now,
            }))
            .into_response())
        }
    }
}

fn attachment(content_type: &'static str, file_name: String, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        body,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_builds_filter() {
        let query = ReceiptQuery {
            start_date: Some("2025-06-01".into()),
            end_date: Some("2025-06-30".into()),
            nature_of_receipt: Some("mf".into()),
            sort_by: Some("marketFee".into()),
            sort_order: Some("ASC".into()),
            ..Default::default()
        };
        let filter = query.filter().unwrap();
        assert_eq!(filter.sort_by, ReceiptSortField::MarketFee);
        assert!(filter.ascending);
        assert_eq!(
            filter.end_before.unwrap().to_rfc3339(),
            "2025-07-01T00:00:00+00:00"
        );
    }

    #[test]
    fn unknown_sort_falls_back_and_bad_dates_fail() {
        let query = ReceiptQuery {
            sort_by: Some("bogus".into()),
            ..Default::default()
        };
        let filter = query.filter().unwrap();
        assert_eq!(filter.sort_by, ReceiptSortField::Date);
        assert!(!filter.ascending);

        let bad = ReceiptQuery {
            start_date: Some("yesterday".into()),
            ..Default::default()
        };
        assert!(bad.filter().is_err());
    }
}

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use sea_orm::SqlErr;
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Error envelope returned by every failing endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "success": false,
    "error": "Validation failed",
    "errors": ["marketFee: Market fee must be greater than 0"],
    "requestId": "req-abc123xyz",
    "timestamp": "2025-06-09T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// Always false
    pub success: bool,
    /// Human-readable error description
    #[schema(example = "Receipt not found")]
    pub error: String,
    /// Field or row level messages for validation failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
    /// Unique request identifier for support and debugging
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// ISO 8601 timestamp when error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[serde(skip)] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Validation failed: {}", .0.join("; "))]
    ValidationErrors(Vec<String>),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Hash error: {0}")]
    HashError(String),

    #[error("JWT error: {0}")]
    JwtError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(
        #[from]
        #[serde(skip)]
        anyhow::Error,
    ),
}

impl From<DbErr> for ServiceError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => {
                ServiceError::Conflict(format!("Duplicate entry violates a unique constraint ({detail})"))
            }
            Some(SqlErr::ForeignKeyConstraintViolation(_)) => {
                ServiceError::NotFound("Referenced record not found".to_string())
            }
            _ => ServiceError::DatabaseError(err),
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationErrors(flatten_validation_errors(&err))
    }
}

impl From<crate::financial_year::FinancialYearError> for ServiceError {
    fn from(err: crate::financial_year::FinancialYearError) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::SerializationError(err.to_string())
    }
}

/// Flattens validator output into `field: message` lines, sorted by field name.
/// Field names are reported in the camelCase used on the wire.
pub fn flatten_validation_errors(errors: &validator::ValidationErrors) -> Vec<String> {
    let mut messages: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            let field = camel_case(field);
            errs.iter().map(move |err| {
                let message = err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("invalid value ({})", err.code));
                format!("{}: {}", field, message)
            })
        })
        .collect();
    messages.sort();
    messages
}

fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for ch in field.chars() {
        if ch == '_' {
            upper = true;
        } else if upper {
            out.extend(ch.to_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}

pub trait IntoDbErr {
    fn into_db_err(self) -> DbErr;
}

impl IntoDbErr for DbErr {
    fn into_db_err(self) -> DbErr {
        self
    }
}

impl IntoDbErr for String {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self)
    }
}

impl IntoDbErr for &str {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self.to_string())
    }
}

impl ServiceError {
    /// Generic constructor that normalizes any supported database error input.
    pub fn db_error<E: IntoDbErr>(error: E) -> Self {
        ServiceError::from(error.into_db_err())
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_)
            | Self::ValidationErrors(_)
            | Self::InvalidInput(_)
            | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) | Self::JwtError(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::DatabaseError(_)
            | Self::HashError(_)
            | Self::SerializationError(_)
            | Self::InternalError(_)
            | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_)
            | Self::HashError(_)
            | Self::SerializationError(_)
            | Self::InternalError(_)
            | Self::Other(_) => "Internal server error".to_string(),
            Self::ValidationErrors(_) => "Validation failed".to_string(),
            Self::NotFound(msg)
            | Self::ValidationError(msg)
            | Self::InvalidInput(msg)
            | Self::BadRequest(msg)
            | Self::Conflict(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::JwtError(msg)
            | Self::ServiceUnavailable(msg) => msg.clone(),
        }
    }

    /// Row or field level details, when the error carries any.
    pub fn details(&self) -> Option<Vec<String>> {
        match self {
            Self::ValidationErrors(errors) => Some(errors.clone()),
            _ => None,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, status = status.as_u16(), "request failed");
        }

        let err = ErrorResponse {
            success: false,
            error: self.response_message(),
            errors: self.details(),
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::to_bytes, http::StatusCode};
    use validator::Validate;

    #[tokio::test]
    async fn service_error_response_includes_request_id() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("req-123"), async {
                ServiceError::NotFound("Receipt not found".into()).into_response()
            })
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert!(!payload.success);
        assert_eq!(payload.error, "Receipt not found");
        assert_eq!(payload.request_id.as_deref(), Some("req-123"));
    }

    #[tokio::test]
    async fn validation_errors_are_listed() {
        let response = ServiceError::ValidationErrors(vec![
            "Row 1: marketFee: Market fee must be greater than 0".into(),
            "Row 2: commodity: Commodity is required".into(),
        ])
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload.error, "Validation failed");
        assert_eq!(payload.errors.map(|e| e.len()), Some(2));
    }

    #[test]
    fn service_error_status_code_mapping() {
        assert_eq!(
            ServiceError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::ValidationError("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::ValidationErrors(vec![]).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::Unauthorized("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServiceError::Forbidden("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServiceError::Conflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::ServiceUnavailable("db".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ServiceError::db_error("boom").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn service_error_response_message_hides_internal_details() {
        assert_eq!(
            ServiceError::HashError("sensitive".into()).response_message(),
            "Internal server error"
        );
        assert_eq!(
            ServiceError::db_error("relation receipts does not exist").response_message(),
            "Internal server error"
        );
        assert_eq!(
            ServiceError::Conflict("Email already registered".into()).response_message(),
            "Email already registered"
        );
    }

    #[derive(Validate)]
    struct ReceiptForm {
        #[validate(length(min = 1, message = "Commodity is required"))]
        commodity: String,
        #[validate(length(min = 2))]
        trader_name: String,
    }

    #[test]
    fn validator_errors_become_field_annotated_lines() {
        let form = ReceiptForm {
            commodity: String::new(),
            trader_name: "x".into(),
        };
        let err: ServiceError = form.validate().unwrap_err().into();
        match err {
            ServiceError::ValidationErrors(lines) => {
                assert_eq!(lines[0], "commodity: Commodity is required");
                assert!(lines[1].starts_with("traderName: "));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}

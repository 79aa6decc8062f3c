pub mod aggregation;
pub mod analytics;
pub mod audit;
pub mod checkposts;
pub mod committees;
pub mod export;
pub mod notifications;
pub mod receipts;
pub mod reports;
pub mod search;
pub mod system;
pub mod targets;
pub mod users;

use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::middleware_helpers::ClientInfo;
use sea_orm::sea_query::{Expr, Func, IntoColumnRef, SimpleExpr};
use uuid::Uuid;

pub use audit::AuditEntry;

/// The user performing a mutation, with the request metadata the audit trail keeps.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: Uuid,
    pub client: ClientInfo,
}

impl Actor {
    pub fn new(user: &AuthUser, client: ClientInfo) -> Self {
        Self {
            user_id: user.user_id,
            client,
        }
    }

    /// Stamps the entry with this actor.
    pub fn audit(&self, entry: AuditEntry) -> AuditEntry {
        entry.by(self.user_id).from_client(&self.client)
    }
}

/// One-based page request, already clamped by the handler layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl PageRequest {
    pub fn new(page: u64, limit: u64) -> Self {
        Self {
            page: page.max(1),
            limit: limit.max(1),
        }
    }

    /// Rows to skip; pages past the addressable range are rejected.
    pub fn offset(&self) -> Result<u64, ServiceError> {
        // Databases bind offsets as signed 64-bit integers
        (self.page - 1)
            .checked_mul(self.limit)
            .filter(|offset| i64::try_from(*offset).is_ok())
            .ok_or_else(|| ServiceError::BadRequest("Page number is too large".to_string()))
    }
}

/// A page of results plus the size of the full result set.
#[derive(Debug, Clone)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total: u64,
}

impl<T> Paged<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paged<U> {
        Paged {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
        }
    }
}

/// Case-insensitive substring match that behaves the same on Postgres and SQLite.
pub(crate) fn contains_ci<C: IntoColumnRef>(column: C, needle: &str) -> SimpleExpr {
    Expr::expr(Func::lower(Expr::col(column))).like(format!("%{}%", needle.trim().to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_request_clamps_to_first_page() {
        let page = PageRequest::new(0, 0);
        assert_eq!(page, PageRequest { page: 1, limit: 1 });
        assert_eq!(PageRequest::new(3, 10).offset().unwrap(), 20);
    }

    #[test]
    fn offset_overflow_is_rejected() {
        let err = PageRequest::new(u64::MAX, 10).offset().unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
        assert!(PageRequest::new(u64::MAX, 1).offset().is_err());
        assert_eq!(PageRequest::new(1_000_001, 100).offset().unwrap(), 100_000_000);
    }
}

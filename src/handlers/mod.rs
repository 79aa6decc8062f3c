pub mod analytics;
pub mod auth;
pub mod checkposts;
pub mod committees;
pub mod common;
pub mod health;
pub mod notifications;
pub mod receipts;
pub mod reports;
pub mod search;
pub mod system;
pub mod targets;

use crate::auth::AuthService;
use crate::services::{
    analytics::AnalyticsService, checkposts::CheckpostService, committees::CommitteeService,
    notifications::NotificationService, receipts::ReceiptService, reports::ReportService,
    search::SearchService, system::SystemService, targets::TargetService, users::UserService,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub committees: Arc<CommitteeService>,
    pub checkposts: Arc<CheckpostService>,
    pub receipts: Arc<ReceiptService>,
    pub targets: Arc<TargetService>,
    pub reports: Arc<ReportService>,
    pub analytics: Arc<AnalyticsService>,
    pub search: Arc<SearchService>,
    pub notifications: Arc<NotificationService>,
    pub system: Arc<SystemService>,
    pub users: Arc<UserService>,
}

impl AppServices {
    /// Builds every service over the shared connection pool.
    pub fn new(db: Arc<DatabaseConnection>, auth: Arc<AuthService>) -> Self {
        Self {
            committees: Arc::new(CommitteeService::new(db.clone())),
            checkposts: Arc::new(CheckpostService::new(db.clone())),
            receipts: Arc::new(ReceiptService::new(db.clone())),
            targets: Arc::new(TargetService::new(db.clone())),
            reports: Arc::new(ReportService::new(db.clone())),
            analytics: Arc::new(AnalyticsService::new(db.clone())),
            search: Arc::new(SearchService::new(db.clone())),
            notifications: Arc::new(NotificationService::new(db.clone())),
            system: Arc::new(SystemService::new(db.clone())),
            users: Arc::new(UserService::new(db, auth)),
        }
    }
}

//! Activity feed derived from recent receipts, target edits and performance.
//!
//! Nothing is stored; notifications are recomputed on every request.

use crate::entities::{committee, receipt, target};
use crate::errors::ServiceError;
use crate::financial_year::FinancialYear;
use crate::services::aggregation::{achievement_percent, total, Window};
use crate::services::export::format_indian;
use crate::services::reports::load_facts;
use crate::services::targets::TargetBook;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

const LOW_ACHIEVEMENT: Decimal = dec!(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Receipt,
    Alert,
    Target,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
    pub priority: Priority,
    #[schema(value_type = Object)]
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationFeed {
    pub notifications: Vec<Notification>,
    pub unread_count: usize,
    pub generated_at: DateTime<Utc>,
}

/// Newest first, cut to `limit`.
pub fn assemble(mut items: Vec<Notification>, limit: usize, now: DateTime<Utc>) -> NotificationFeed {
    items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.priority.cmp(&a.priority)));
    items.truncate(limit);
    NotificationFeed {
        unread_count: items.iter().filter(|n| !n.read).count(),
        notifications: items,
        generated_at: now,
    }
}

#[derive(Clone)]
pub struct NotificationService {
    db: Arc<DatabaseConnection>,
}

impl NotificationService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn feed(&self, limit: u64) -> Result<NotificationFeed, ServiceError> {
        let now = Utc::now();
        let mut items = Vec::new();
        items.extend(self.recent_receipts(now, limit).await?);
        items.extend(self.low_performers(now).await?);
        items.extend(self.target_updates(now, limit).await?);
        items.extend(self.system_alerts(now).await?);
        Ok(assemble(items, limit as usize, now))
    }

    async fn committee_names(&self) -> Result<HashMap<Uuid, committee::Model>, ServiceError> {
        Ok(committee::Entity::find()
            .filter(committee::Column::IsActive.eq(true))
            .filter(committee::Column::DeletedAt.is_null())
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect())
    }

    /// Receipts entered in the last 24 hours
    async fn recent_receipts(&self, now: DateTime<Utc>, limit: u64) -> Result<Vec<Notification>, ServiceError> {
        let rows = receipt::Entity::find()
            .filter(receipt::Column::IsActive.eq(true))
            .filter(receipt::Column::DeletedAt.is_null())
            .filter(receipt::Column::CreatedAt.gte(now - Duration::hours(24)))
            .order_by_desc(receipt::Column::CreatedAt)
            .limit(limit)
            .all(&*self.db)
            .await?;
        let committees = self.committee_names().await?;
        Ok(rows
            .into_iter()
            .map(|r| Notification {
                id: format!("receipt-{}", r.id),
                kind: NotificationKind::Receipt,
                title: "New Receipt Added".to_string(),
                message: format!(
                    "Receipt {} for ₹{} added to {}",
                    r.receipt_number,
                    format_indian(r.market_fee),
                    committees.get(&r.committee_id).map(|c| c.name.as_str()).unwrap_or("unknown committee")
                ),
                timestamp: r.created_at,
                read: false,
                priority: Priority::Low,
                data: serde_json::json!({ "receiptId": r.id }),
            })
            .collect())
    }

    /// Committees with a target that have collected less than half of it this year
    async fn low_performers(&self, now: DateTime<Utc>) -> Result<Vec<Notification>, ServiceError> {
        let db = &*self.db;
        let fy = FinancialYear::containing(&now);
        let targets = TargetBook::load(db, fy).await?;
        let facts = load_facts(db, &[fy], None, true).await?;

        let mut committees: Vec<committee::Model> = self.committee_names().await?.into_values().collect();
        committees.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(committees
            .into_iter()
            .filter_map(|c| {
                let yearly = targets.committee(c.id).yearly;
                if yearly <= Decimal::ZERO {
                    return None;
                }
                let collected = total(facts.iter().filter(|f| f.committee_id == c.id), fy, Window::FullYear).amount;
                (achievement_percent(collected, yearly) < LOW_ACHIEVEMENT).then(|| Notification {
                    id: format!("low-performance-{}", c.id),
                    kind: NotificationKind::Alert,
                    title: "Low Performance Alert".to_string(),
                    message: format!("{} is performing below 50% of target for {}", c.name, fy),
                    timestamp: now,
                    read: false,
                    priority: Priority::High,
                    data: serde_json::json!({ "committeeId": c.id }),
                })
            })
            .collect())
    }

    /// Targets changed in the last seven days
    async fn target_updates(&self, now: DateTime<Utc>, limit: u64) -> Result<Vec<Notification>, ServiceError> {
        let rows = target::Entity::find()
            .filter(target::Column::IsActive.eq(true))
            .filter(target::Column::DeletedAt.is_null())
            .filter(target::Column::UpdatedAt.gte(now - Duration::days(7)))
            .order_by_desc(target::Column::UpdatedAt)
            .limit(limit)
            .all(&*self.db)
            .await?;
        let committees = self.committee_names().await?;
        Ok(rows
            .into_iter()
            .map(|t| Notification {
                id: format!("target-{}", t.id),
                kind: NotificationKind::Target,
                title: "Target Updated".to_string(),
                message: format!(
                    "Target for {} ({}) updated to ₹{}",
                    committees.get(&t.committee_id).map(|c| c.name.as_str()).unwrap_or("unknown committee"),
                    t.financial_year,
                    format_indian(t.yearly_target)
                ),
                timestamp: t.updated_at,
                read: false,
                priority: Priority::Medium,
                data: serde_json::json!({ "targetId": t.id }),
            })
            .collect())
    }

    async fn system_alerts(&self, now: DateTime<Utc>) -> Result<Vec<Notification>, ServiceError> {
        let receipts = receipt::Entity::find()
            .filter(receipt::Column::IsActive.eq(true))
            .count(&*self.db)
            .await?;
        if receipts > 0 {
            return Ok(Vec::new());
        }
        Ok(vec![Notification {
            id: "no-receipts".to_string(),
            kind: NotificationKind::System,
            title: "No Receipts Found".to_string(),
            message: "No receipts have been entered in the system".to_string(),
            timestamp: now,
            read: false,
            priority: Priority::Medium,
            data: serde_json::json!({}),
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(id: &str, minutes_ago: i64, read: bool) -> Notification {
        Notification {
            id: id.into(),
            kind: NotificationKind::Receipt,
            title: String::new(),
            message: String::new(),
            timestamp: Utc::now() - Duration::minutes(minutes_ago),
            read,
            priority: Priority::Low,
            data: serde_json::Value::Null,
        }
    }

    #[test]
    fn feed_is_newest_first_and_limited() {
        let feed = assemble(
            vec![note("old", 90, false), note("new", 1, true), note("mid", 30, false)],
            2,
            Utc::now(),
        );
        let ids: Vec<&str> = feed.notifications.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid"]);
        assert_eq!(feed.unread_count, 1);
    }

    #[test]
    fn amounts_use_indian_grouping() {
        assert_eq!(format_indian(dec!(1234567.5)), "12,34,567.5");
        assert_eq!(format_indian(dec!(999)), "999");
        assert_eq!(format_indian(dec!(100000)), "1,00,000");
        assert_eq!(format_indian(dec!(-2500.00)), "-2,500");
    }
}

use crate::entities::{checkpost, committee, receipt};
use crate::errors::ServiceError;
use crate::services::{contains_ci, PageRequest};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, Func, SimpleExpr};
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

pub const MIN_QUERY_LEN: usize = 2;
/// Hits per entity type when searching everything
pub const PREVIEW_LIMIT: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    #[default]
    All,
    Receipts,
    Committees,
    Checkposts,
}

impl SearchType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "all" => Some(Self::All),
            "receipts" => Some(Self::Receipts),
            "committees" => Some(Self::Committees),
            "checkposts" => Some(Self::Checkposts),
            _ => None,
        }
    }

    fn covers(self, other: SearchType) -> bool {
        self == SearchType::All || self == other
    }
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HitStats {
    pub receipts: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkposts: Option<u64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub subtitle: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<HitStats>,
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchGroups {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipts: Option<Vec<SearchHit>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub committees: Option<Vec<SearchHit>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkposts: Option<Vec<SearchHit>>,
}

impl SearchGroups {
    fn len(&self) -> usize {
        [&self.receipts, &self.committees, &self.checkposts]
            .iter()
            .map(|group| group.as_ref().map_or(0, Vec::len))
            .sum()
    }

    /// Cuts every group down to `limit`, reporting whether anything was dropped.
    fn truncate(&mut self, limit: usize) -> bool {
        let mut dropped = false;
        for group in [&mut self.receipts, &mut self.committees, &mut self.checkposts]
            .into_iter()
            .flatten()
        {
            dropped |= group.len() > limit;
            group.truncate(limit);
        }
        dropped
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchPagination {
    pub page: u64,
    pub limit: u64,
    pub has_more: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    pub query: String,
    #[serde(rename = "type")]
    pub kind: SearchType,
    pub results: SearchGroups,
    pub total_results: usize,
    pub pagination: SearchPagination,
}

/// Rejects queries too short to be useful.
pub fn check_query(query: &str) -> Result<&str, ServiceError> {
    let trimmed = query.trim();
    if trimmed.chars().count() < MIN_QUERY_LEN {
        return Err(ServiceError::ValidationError(
            "Search query must be at least 2 characters".to_string(),
        ));
    }
    Ok(trimmed)
}

#[derive(Clone)]
pub struct SearchService {
    db: Arc<DatabaseConnection>,
}

impl SearchService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// A single type pages through its hits; `all` previews each type.
    #[instrument(skip(self))]
    pub async fn search(
        &self,
        query: &str,
        kind: SearchType,
        page: PageRequest,
    ) -> Result<SearchResults, ServiceError> {
        let term = check_query(query)?;
        let (offset, limit) = match kind {
            SearchType::All => (0, PREVIEW_LIMIT),
            _ => (page.offset()?, page.limit + 1),
        };

        let mut results = SearchGroups::default();
        if kind.covers(SearchType::Receipts) {
            results.receipts = Some(self.receipts(term, offset, limit).await?);
        }
        if kind.covers(SearchType::Committees) {
            results.committees = Some(self.committees(term, offset, limit).await?);
        }
        if kind.covers(SearchType::Checkposts) {
            results.checkposts = Some(self.checkposts(term, offset, limit).await?);
        }

        // Single-type searches fetch one extra row to learn whether a next page exists
        let has_more = kind != SearchType::All && results.truncate(page.limit as usize);
        let total_results = results.len();
        Ok(SearchResults {
            query: term.to_string(),
            kind,
            results,
            total_results,
            pagination: SearchPagination {
                page: page.page,
                limit: page.limit,
                has_more,
            },
        })
    }

    async fn receipts(&self, term: &str, offset: u64, limit: u64) -> Result<Vec<SearchHit>, ServiceError> {
        let db = &*self.db;
        let rows = receipt::Entity::find()
            .filter(receipt::Column::IsActive.eq(true))
            .filter(receipt::Column::DeletedAt.is_null())
            .filter(
                Condition::any()
                    .add(contains_ci(receipt::Column::ReceiptNumber, term))
                    .add(contains_ci(receipt::Column::BookNumber, term))
                    .add(contains_ci(receipt::Column::TraderName, term))
                    .add(contains_ci(receipt::Column::PayeeName, term))
                    .add(contains_ci(receipt::Column::Commodity, term)),
            )
            .order_by_desc(receipt::Column::CreatedAt)
            .offset(offset)
            .limit(limit)
            .all(db)
            .await?;

        let names: HashMap<Uuid, String> = committee::Entity::find()
            .filter(committee::Column::Id.is_in(rows.iter().map(|r| r.committee_id).collect::<Vec<_>>()))
            .all(db)
            .await?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect();

        Ok(rows
            .into_iter()
            .map(|r| SearchHit {
                id: r.id,
                kind: "receipt".to_string(),
                title: format!("Receipt {}", r.receipt_number),
                subtitle: format!(
                    "{} - {}",
                    r.trader_name,
                    names.get(&r.committee_id).map(String::as_str).unwrap_or("")
                ),
                amount: Some(crate::services::aggregation::to_f64(r.market_fee, 2)),
                date: Some(r.date),
                stats: None,
                url: format!("/receipts/{}", r.id),
            })
            .collect())
    }

    async fn committees(&self, term: &str, offset: u64, limit: u64) -> Result<Vec<SearchHit>, ServiceError> {
        let db = &*self.db;
        let rows = committee::Entity::find()
            .filter(committee::Column::IsActive.eq(true))
            .filter(committee::Column::DeletedAt.is_null())
            .filter(
                Condition::any()
                    .add(contains_ci(committee::Column::Name, term))
                    .add(contains_ci(committee::Column::Code, term)),
            )
            .order_by_asc(committee::Column::Name)
            .offset(offset)
            .limit(limit)
            .all(db)
            .await?;
        let ids: Vec<Uuid> = rows.iter().map(|c| c.id).collect();

        let receipt_counts = self.receipt_counts(receipt::Column::CommitteeId, &ids).await?;
        let checkpost_counts: HashMap<Uuid, i64> = if ids.is_empty() {
            HashMap::new()
        } else {
            checkpost::Entity::find()
                .select_only()
                .column(checkpost::Column::CommitteeId)
                .column_as(SimpleExpr::from(Func::count(Expr::col(checkpost::Column::Id))), "count")
                .filter(checkpost::Column::CommitteeId.is_in(ids))
                .filter(checkpost::Column::IsActive.eq(true))
                .filter(checkpost::Column::DeletedAt.is_null())
                .group_by(checkpost::Column::CommitteeId)
                .into_tuple::<(Uuid, i64)>()
                .all(db)
                .await?
                .into_iter()
                .collect()
        };

        Ok(rows
            .into_iter()
            .map(|c| SearchHit {
                stats: Some(HitStats {
                    receipts: receipt_counts.get(&c.id).copied().unwrap_or(0) as u64,
                    checkposts: Some(checkpost_counts.get(&c.id).copied().unwrap_or(0) as u64),
                }),
                url: format!("/committees/{}", c.id),
                id: c.id,
                kind: "committee".to_string(),
                title: c.name,
                subtitle: format!("Code: {}", c.code),
                amount: None,
                date: None,
            })
            .collect())
    }

    async fn checkposts(&self, term: &str, offset: u64, limit: u64) -> Result<Vec<SearchHit>, ServiceError> {
        let db = &*self.db;
        let rows = checkpost::Entity::find()
            .filter(checkpost::Column::IsActive.eq(true))
            .filter(checkpost::Column::DeletedAt.is_null())
            .filter(
                Condition::any()
                    .add(contains_ci(checkpost::Column::Name, term))
                    .add(contains_ci(checkpost::Column::Location, term)),
            )
            .order_by_asc(checkpost::Column::Name)
            .offset(offset)
            .limit(limit)
            .all(db)
            .await?;
        let ids: Vec<Uuid> = rows.iter().map(|c| c.id).collect();
        let receipt_counts = self.receipt_counts(receipt::Column::CheckpostId, &ids).await?;
        let names: HashMap<Uuid, String> = committee::Entity::find()
            .filter(committee::Column::Id.is_in(rows.iter().map(|c| c.committee_id).collect::<Vec<_>>()))
            .all(db)
            .await?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect();

        Ok(rows
            .into_iter()
            .map(|cp| SearchHit {
                subtitle: format!(
                    "{} - {}",
                    names.get(&cp.committee_id).map(String::as_str).unwrap_or(""),
                    cp.location.as_deref().unwrap_or("No location")
                ),
                stats: Some(HitStats {
                    receipts: receipt_counts.get(&cp.id).copied().unwrap_or(0) as u64,
                    checkposts: None,
                }),
                url: format!("/checkposts/{}", cp.id),
                id: cp.id,
                kind: "checkpost".to_string(),
                title: cp.name,
                amount: None,
                date: None,
            })
            .collect())
    }

    /// Active receipt counts grouped by `column` for the given owners
    async fn receipt_counts(
        &self,
        column: receipt::Column,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, i64>, ServiceError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = receipt::Entity::find()
            .select_only()
            .column(column)
            .column_as(SimpleExpr::from(Func::count(Expr::col(receipt::Column::Id))), "count")
            .filter(column.is_in(ids.to_vec()))
            .filter(receipt::Column::IsActive.eq(true))
            .filter(receipt::Column::DeletedAt.is_null())
            .group_by(column)
            .into_tuple::<(Uuid, i64)>()
            .all(&*self.db)
            .await?;
        Ok(rows.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn short_queries_are_rejected() {
        assert_matches!(check_query("a"), Err(ServiceError::ValidationError(m)) if m == "Search query must be at least 2 characters");
        assert_matches!(check_query("  b "), Err(_));
        assert_eq!(check_query(" ka ").unwrap(), "ka");
    }

    #[test]
    fn search_type_parsing() {
        assert_eq!(SearchType::parse("checkposts"), Some(SearchType::Checkposts));
        assert_eq!(SearchType::parse("traders"), None);
        assert!(SearchType::All.covers(SearchType::Receipts));
        assert!(!SearchType::Committees.covers(SearchType::Receipts));
    }

    #[test]
    fn groups_count_every_hit() {
        let hit = SearchHit {
            id: Uuid::nil(),
            kind: "committee".into(),
            title: "Karapa".into(),
            subtitle: "Code: KRP-AMC".into(),
            amount: None,
            date: None,
            stats: None,
            url: "/committees/x".into(),
        };
        let groups = SearchGroups {
            committees: Some(vec![hit.clone(), hit]),
            checkposts: Some(Vec::new()),
            receipts: None,
        };
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn truncate_reports_only_overflowing_groups() {
        let hit = SearchHit {
            id: Uuid::nil(),
            kind: "receipt".into(),
            title: "Receipt R1".into(),
            subtitle: "Trader - Karapa".into(),
            amount: Some(10.0),
            date: None,
            stats: None,
            url: "/receipts/x".into(),
        };
        let mut exact = SearchGroups {
            receipts: Some(vec![hit.clone(), hit.clone()]),
            ..Default::default()
        };
        assert!(!exact.truncate(2));
        assert_eq!(exact.len(), 2);

        let mut extra = SearchGroups {
            receipts: Some(vec![hit.clone(), hit.clone(), hit]),
            ..Default::default()
        };
        assert!(extra.truncate(2));
        assert_eq!(extra.len(), 2);
    }
}

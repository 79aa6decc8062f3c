use crate::entities::{checkpost, committee, receipt, target, AuditAction};
use crate::errors::ServiceError;
use crate::services::checkposts::CheckpostView;
use crate::services::{contains_ci, Actor, AuditEntry, PageRequest, Paged};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, Func, SimpleExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

pub const DEFAULT_DISTRICT: &str = "KAKINADA";
pub const DEFAULT_STATE: &str = "Andhra Pradesh";

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommitteeRequest {
    #[validate(length(min = 1, max = 255, message = "Committee name is required"))]
    pub name: String,
    #[validate(length(min = 1, max = 50, message = "Committee code is required"))]
    pub code: String,
    pub district: Option<String>,
    pub state: Option<String>,
    pub has_checkposts: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCommitteeRequest {
    #[validate(length(min = 1, max = 255, message = "Committee name is required"))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 50, message = "Committee code is required"))]
    pub code: Option<String>,
    pub district: Option<String>,
    pub state: Option<String>,
    pub has_checkposts: Option<bool>,
}

/// Committee fields embedded in other resources
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommitteeSummary {
    pub id: Uuid,
    pub name: String,
    pub code: String,
}

impl From<&committee::Model> for CommitteeSummary {
    fn from(model: &committee::Model) -> Self {
        Self {
            id: model.id,
            name: model.name.clone(),
            code: model.code.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommitteeCounts {
    pub receipts: u64,
    pub targets: u64,
    pub checkposts: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommitteeView {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub district: String,
    pub state: String,
    pub has_checkposts: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub checkposts: Vec<CheckpostView>,
    pub counts: CommitteeCounts,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TargetSummary {
    pub id: Uuid,
    pub financial_year: String,
    #[schema(value_type = String)]
    pub yearly_target: Decimal,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommitteeDetail {
    #[serde(flatten)]
    pub committee: CommitteeView,
    /// Newest financial year first
    pub targets: Vec<TargetSummary>,
}

#[derive(Clone)]
pub struct CommitteeService {
    db: Arc<DatabaseConnection>,
}

impl CommitteeService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        page: PageRequest,
        search: Option<String>,
    ) -> Result<Paged<CommitteeView>, ServiceError> {
        let db = &*self.db;
        let mut query = committee::Entity::find()
            .filter(committee::Column::IsActive.eq(true))
            .filter(committee::Column::DeletedAt.is_null())
            .order_by_asc(committee::Column::Name);

        if let Some(term) = search.as_deref().filter(|s| !s.trim().is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(contains_ci(committee::Column::Name, term))
                    .add(contains_ci(committee::Column::Code, term)),
            );
        }

        let paginator = query.paginate(db, page.limit);
        let total = paginator.num_items().await?;
        let committees = paginator.fetch_page(page.page - 1).await?;

        let items = self.decorate(db, committees).await?;
        Ok(Paged { items, total })
    }

    /// Every active committee, by name, without pagination
    pub async fn all_active(&self) -> Result<Vec<committee::Model>, ServiceError> {
        Ok(committee::Entity::find()
            .filter(committee::Column::IsActive.eq(true))
            .filter(committee::Column::DeletedAt.is_null())
            .order_by_asc(committee::Column::Name)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<CommitteeDetail, ServiceError> {
        let db = &*self.db;
        let model = find_active(db, id).await?;

        let targets = target::Entity::find()
            .filter(target::Column::CommitteeId.eq(id))
            .filter(target::Column::IsActive.eq(true))
            .filter(target::Column::DeletedAt.is_null())
            .order_by_desc(target::Column::FinancialYear)
            .order_by_desc(target::Column::CreatedAt)
            .all(db)
            .await?
            .into_iter()
            .map(|t| TargetSummary {
                id: t.id,
                financial_year: t.financial_year,
                yearly_target: t.yearly_target,
                description: t.description,
            })
            .collect();

        let mut decorated = self.decorate(db, vec![model]).await?;
        let committee = decorated
            .pop()
            .ok_or_else(|| ServiceError::NotFound("Committee not found".to_string()))?;

        Ok(CommitteeDetail { committee, targets })
    }

    #[instrument(skip(self, actor))]
    pub async fn create(
        &self,
        request: CreateCommitteeRequest,
        actor: &Actor,
    ) -> Result<CommitteeView, ServiceError> {
        request.validate()?;
        let code = request.code.trim().to_string();

        let txn = self.db.begin().await?;
        ensure_code_available(&txn, &code, None).await?;

        let now = Utc::now();
        let created = committee::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name.trim().to_string()),
            code: Set(code),
            district: Set(request
                .district
                .unwrap_or_else(|| DEFAULT_DISTRICT.to_string())),
            state: Set(request.state.unwrap_or_else(|| DEFAULT_STATE.to_string())),
            has_checkposts: Set(request.has_checkposts.unwrap_or(false)),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
        }
        .insert(&txn)
        .await?;

        actor
            .audit(AuditEntry::new("committees", created.id, AuditAction::Create).new_values(&created))
            .write(&txn)
            .await?;
        txn.commit().await?;

        info!(committee_id = %created.id, code = %created.code, "committee created");
        Ok(view(created, Vec::new(), CommitteeCounts::default()))
    }

    #[instrument(skip(self, actor))]
    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateCommitteeRequest,
        actor: &Actor,
    ) -> Result<CommitteeView, ServiceError> {
        request.validate()?;

        let txn = self.db.begin().await?;
        let existing = find_active(&txn, id).await?;

        let mut active: committee::ActiveModel = existing.clone().into();
        if let Some(name) = request.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(code) = request.code {
            let code = code.trim().to_string();
            if code != existing.code {
                ensure_code_available(&txn, &code, Some(id)).await?;
            }
            active.code = Set(code);
        }
        if let Some(district) = request.district {
            active.district = Set(district);
        }
        if let Some(state) = request.state {
            active.state = Set(state);
        }
        if let Some(flag) = request.has_checkposts {
            active.has_checkposts = Set(flag);
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;

        actor
            .audit(
                AuditEntry::new("committees", id, AuditAction::Update)
                    .old(&existing)
                    .new_values(&updated),
            )
            .write(&txn)
            .await?;
        txn.commit().await?;

        info!(committee_id = %id, "committee updated");
        let mut decorated = self.decorate(&*self.db, vec![updated]).await?;
        decorated
            .pop()
            .ok_or_else(|| ServiceError::NotFound("Committee not found".to_string()))
    }

    #[instrument(skip(self, actor))]
    pub async fn delete(&self, id: Uuid, actor: &Actor) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;
        let existing = find_active(&txn, id).await?;

        let now = Utc::now();
        let mut active: committee::ActiveModel = existing.clone().into();
        active.is_active = Set(false);
        active.deleted_at = Set(Some(now));
        active.updated_at = Set(now);
        active.update(&txn).await?;

        actor
            .audit(AuditEntry::new("committees", id, AuditAction::Delete).old(&existing))
            .write(&txn)
            .await?;
        txn.commit().await?;

        info!(committee_id = %id, "committee deleted");
        Ok(())
    }

    /// Attaches active checkposts and row counts to each committee
    async fn decorate<C: ConnectionTrait>(
        &self,
        db: &C,
        committees: Vec<committee::Model>,
    ) -> Result<Vec<CommitteeView>, ServiceError> {
        if committees.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = committees.iter().map(|c| c.id).collect();

        let mut checkposts: HashMap<Uuid, Vec<CheckpostView>> = HashMap::new();
        for cp in checkpost::Entity::find()
            .filter(checkpost::Column::CommitteeId.is_in(ids.clone()))
            .filter(checkpost::Column::IsActive.eq(true))
            .filter(checkpost::Column::DeletedAt.is_null())
            .order_by_asc(checkpost::Column::Name)
            .all(db)
            .await?
        {
            checkposts.entry(cp.committee_id).or_default().push(cp.into());
        }

        let receipt_counts: HashMap<Uuid, i64> = receipt::Entity::find()
            .select_only()
            .column(receipt::Column::CommitteeId)
            .column_as(SimpleExpr::from(Func::count(Expr::col(receipt::Column::Id))), "count")
            .filter(receipt::Column::CommitteeId.is_in(ids.clone()))
            .filter(receipt::Column::IsActive.eq(true))
            .filter(receipt::Column::DeletedAt.is_null())
            .group_by(receipt::Column::CommitteeId)
            .into_tuple::<(Uuid, i64)>()
            .all(db)
            .await?
            .into_iter()
            .collect();

        let target_counts: HashMap<Uuid, i64> = target::Entity::find()
            .select_only()
            .column(target::Column::CommitteeId)
            .column_as(SimpleExpr::from(Func::count(Expr::col(target::Column::Id))), "count")
            .filter(target::Column::CommitteeId.is_in(ids))
            .filter(target::Column::IsActive.eq(true))
            .filter(target::Column::DeletedAt.is_null())
            .group_by(target::Column::CommitteeId)
            .into_tuple::<(Uuid, i64)>()
            .all(db)
            .await?
            .into_iter()
            .collect();

        Ok(committees
            .into_iter()
            .map(|c| {
                let cps = checkposts.remove(&c.id).unwrap_or_default();
                let counts = CommitteeCounts {
                    receipts: receipt_counts.get(&c.id).copied().unwrap_or(0).max(0) as u64,
                    targets: target_counts.get(&c.id).copied().unwrap_or(0).max(0) as u64,
                    checkposts: cps.len() as u64,
                };
                view(c, cps, counts)
            })
            .collect())
    }
}

fn view(model: committee::Model, checkposts: Vec<CheckpostView>, counts: CommitteeCounts) -> CommitteeView {
    CommitteeView {
        id: model.id,
        name: model.name,
        code: model.code,
        district: model.district,
        state: model.state,
        has_checkposts: model.has_checkposts,
        created_at: model.created_at,
        updated_at: model.updated_at,
        checkposts,
        counts,
    }
}

/// Loads an active committee or fails with 404
pub(crate) async fn find_active<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
) -> Result<committee::Model, ServiceError> {
    committee::Entity::find_by_id(id)
        .filter(committee::Column::IsActive.eq(true))
        .filter(committee::Column::DeletedAt.is_null())
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Committee not found".to_string()))
}

async fn ensure_code_available<C: ConnectionTrait>(
    db: &C,
    code: &str,
    except: Option<Uuid>,
) -> Result<(), ServiceError> {
    let mut query = committee::Entity::find()
        .filter(committee::Column::Code.eq(code))
        .filter(committee::Column::IsActive.eq(true))
        .filter(committee::Column::DeletedAt.is_null());
    if let Some(id) = except {
        query = query.filter(committee::Column::Id.ne(id));
    }
    if query.one(db).await?.is_some() {
        return Err(ServiceError::Conflict(format!(
            "Committee with code '{}' already exists",
            code
        )));
    }
    Ok(())
}

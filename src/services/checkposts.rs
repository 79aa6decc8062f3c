use crate::entities::{checkpost, committee, AuditAction};
use crate::errors::ServiceError;
use crate::services::committees::CommitteeSummary;
use crate::services::{Actor, AuditEntry};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckpostRequest {
    #[validate(length(min = 1, max = 255, message = "Checkpost name is required"))]
    pub name: String,
    pub committee_id: Uuid,
    pub location: Option<String>,
}

/// Checkpost as returned by the API
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckpostView {
    pub id: Uuid,
    pub name: String,
    pub location: Option<String>,
    pub committee_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<checkpost::Model> for CheckpostView {
    fn from(model: checkpost::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            location: model.location,
            committee_id: model.committee_id,
            created_at: model.created_at,
        }
    }
}

/// Checkpost fields embedded in receipt responses
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckpostSummary {
    pub id: Uuid,
    pub name: String,
    pub location: Option<String>,
}

impl From<&checkpost::Model> for CheckpostSummary {
    fn from(model: &checkpost::Model) -> Self {
        Self {
            id: model.id,
            name: model.name.clone(),
            location: model.location.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckpostWithCommittee {
    #[serde(flatten)]
    pub checkpost: CheckpostView,
    pub committee: CommitteeSummary,
}

#[derive(Clone)]
pub struct CheckpostService {
    db: Arc<DatabaseConnection>,
}

impl CheckpostService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Active checkposts of active committees, by committee then name
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        committee_id: Option<Uuid>,
    ) -> Result<Vec<CheckpostWithCommittee>, ServiceError> {
        let db = &*self.db;
        let mut query = checkpost::Entity::find()
            .filter(checkpost::Column::IsActive.eq(true))
            .filter(checkpost::Column::DeletedAt.is_null())
            .order_by_asc(checkpost::Column::Name);
        if let Some(committee_id) = committee_id {
            query = query.filter(checkpost::Column::CommitteeId.eq(committee_id));
        }
        let checkposts = query.all(db).await?;

        let committees: HashMap<Uuid, committee::Model> = committee::Entity::find()
            .filter(committee::Column::IsActive.eq(true))
            .filter(committee::Column::DeletedAt.is_null())
            .all(db)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();

        Ok(checkposts
            .into_iter()
            .filter_map(|cp| {
                let committee = committees.get(&cp.committee_id)?;
                Some(CheckpostWithCommittee {
                    committee: CommitteeSummary::from(committee),
                    checkpost: cp.into(),
                })
            })
            .collect())
    }

    #[instrument(skip(self, actor))]
    pub async fn create(
        &self,
        request: CreateCheckpostRequest,
        actor: &Actor,
    ) -> Result<CheckpostView, ServiceError> {
        request.validate()?;
        let name = request.name.trim().to_string();

        let txn = self.db.begin().await?;

        let parent = committee::Entity::find_by_id(request.committee_id)
            .filter(committee::Column::IsActive.eq(true))
            .filter(committee::Column::DeletedAt.is_null())
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Committee not found".to_string()))?;

        let existing = checkpost::Entity::find()
            .filter(checkpost::Column::CommitteeId.eq(parent.id))
            .filter(checkpost::Column::Name.eq(name.clone()))
            .filter(checkpost::Column::IsActive.eq(true))
            .filter(checkpost::Column::DeletedAt.is_null())
            .one(&txn)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Checkpost '{}' already exists for committee '{}'",
                name, parent.code
            )));
        }

        let now = Utc::now();
        let created = checkpost::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name),
            location: Set(request.location.filter(|l| !l.trim().is_empty())),
            committee_id: Set(parent.id),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
        }
        .insert(&txn)
        .await?;

        // A committee with a checkpost accepts checkpost targets
        if !parent.has_checkposts {
            let mut flagged: committee::ActiveModel = parent.into();
            flagged.has_checkposts = Set(true);
            flagged.updated_at = Set(now);
            flagged.update(&txn).await?;
        }

        actor
            .audit(AuditEntry::new("checkposts", created.id, AuditAction::Create).new_values(&created))
            .write(&txn)
            .await?;

        txn.commit().await?;

        info!(checkpost_id = %created.id, committee_id = %created.committee_id, "checkpost created");
        Ok(created.into())
    }

    #[instrument(skip(self, actor))]
    pub async fn delete(&self, id: Uuid, actor: &Actor) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        let existing = checkpost::Entity::find_by_id(id)
            .filter(checkpost::Column::IsActive.eq(true))
            .filter(checkpost::Column::DeletedAt.is_null())
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Checkpost not found".to_string()))?;

        let now = Utc::now();
        let mut active: checkpost::ActiveModel = existing.clone().into();
        active.is_active = Set(false);
        active.deleted_at = Set(Some(now));
        active.updated_at = Set(now);
        active.update(&txn).await?;

        actor
            .audit(AuditEntry::new("checkposts", id, AuditAction::Delete).old(&existing))
            .write(&txn)
            .await?;

        txn.commit().await?;
        info!(checkpost_id = %id, "checkpost deleted");
        Ok(())
    }
}

use crate::entities::{
    audit_log, checkpost, checkpost_target, committee, monthly_target, receipt, system_config,
    target, user, AuditAction, ConfigDataType,
};
use crate::errors::ServiceError;
use crate::services::{Actor, AuditEntry};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

pub const BACKUP_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EntityCounts {
    pub committees: u64,
    pub checkposts: u64,
    pub receipts: u64,
    pub targets: u64,
    pub users: u64,
    pub audit_logs: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecentActivity {
    pub receipts: u64,
    pub targets: u64,
    pub audit_logs: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInfo {
    pub uptime_seconds: u64,
    pub version: String,
    pub os: String,
    pub arch: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SystemStats {
    pub database: EntityCounts,
    pub last_24_hours: RecentActivity,
    pub system: ProcessInfo,
    pub generated_at: DateTime<Utc>,
    pub generated_by: Uuid,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackupMetadata {
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub version: String,
    pub include_audit_logs: bool,
    /// SHA-256 over the serialized `data` section
    pub checksum: String,
    pub counts: EntityCounts,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackupData {
    #[schema(value_type = Vec<Object>)]
    pub committees: Vec<committee::Model>,
    #[schema(value_type = Vec<Object>)]
    pub checkposts: Vec<checkpost::Model>,
    #[schema(value_type = Vec<Object>)]
    pub receipts: Vec<receipt::Model>,
    #[schema(value_type = Vec<Object>)]
    pub targets: Vec<target::Model>,
    #[schema(value_type = Vec<Object>)]
    pub monthly_targets: Vec<monthly_target::Model>,
    #[schema(value_type = Vec<Object>)]
    pub checkpost_targets: Vec<checkpost_target::Model>,
    #[schema(value_type = Vec<Object>)]
    pub users: Vec<user::Model>,
    #[schema(value_type = Vec<Object>)]
    pub system_configs: Vec<system_config::Model>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Vec<Object>>)]
    pub audit_logs: Option<Vec<audit_log::Model>>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    pub data: BackupData,
    pub metadata: BackupMetadata,
}

impl Backup {
    pub fn file_name(&self) -> String {
        format!("amc-backup-{}.json", self.metadata.created_at.format("%Y-%m-%d"))
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
    pub data_type: ConfigDataType,
    pub category: String,
    pub description: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<system_config::Model> for ConfigEntry {
    fn from(model: system_config::Model) -> Self {
        Self {
            key: model.key,
            value: model.value,
            data_type: model.data_type,
            category: model.category,
            description: model.description,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpsertConfigRequest {
    pub value: String,
    #[serde(default = "default_data_type")]
    pub data_type: ConfigDataType,
    #[serde(default = "default_category")]
    #[validate(length(min = 1, max = 50, message = "Category is required"))]
    pub category: String,
    pub description: Option<String>,
}

fn default_data_type() -> ConfigDataType {
    ConfigDataType::Text
}

fn default_category() -> String {
    "general".to_string()
}

/// SHA-256 of `value`'s JSON form, hex encoded.
pub fn checksum<T: Serialize>(value: &T) -> Result<String, ServiceError> {
    let bytes = serde_json::to_vec(value)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

#[derive(Clone)]
pub struct SystemService {
    db: Arc<DatabaseConnection>,
    started: Instant,
}

impl SystemService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            db,
            started: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    /// Active row counts per table; audit logs are counted in full.
    pub async fn entity_counts(&self) -> Result<EntityCounts, ServiceError> {
        let db = &*self.db;
        Ok(EntityCounts {
            committees: committee::Entity::find()
                .filter(committee::Column::IsActive.eq(true))
                .filter(committee::Column::DeletedAt.is_null())
                .count(db)
                .await?,
            checkposts: checkpost::Entity::find()
                .filter(checkpost::Column::IsActive.eq(true))
                .filter(checkpost::Column::DeletedAt.is_null())
                .count(db)
                .await?,
            receipts: receipt::Entity::find()
                .filter(receipt::Column::IsActive.eq(true))
                .filter(receipt::Column::DeletedAt.is_null())
                .count(db)
                .await?,
            targets: target::Entity::find()
                .filter(target::Column::IsActive.eq(true))
                .filter(target::Column::DeletedAt.is_null())
                .count(db)
                .await?,
            users: user::Entity::find()
                .filter(user::Column::IsActive.eq(true))
                .filter(user::Column::DeletedAt.is_null())
                .count(db)
                .await?,
            audit_logs: audit_log::Entity::find().count(db).await?,
        })
    }

    #[instrument(skip(self))]
    pub async fn stats(&self, requested_by: Uuid) -> Result<SystemStats, ServiceError> {
        let db = &*self.db;
        let since = Utc::now() - Duration::hours(24);
        Ok(SystemStats {
            database: self.entity_counts().await?,
            last_24_hours: RecentActivity {
                receipts: receipt::Entity::find()
                    .filter(receipt::Column::CreatedAt.gte(since))
                    .count(db)
                    .await?,
                targets: target::Entity::find()
                    .filter(target::Column::CreatedAt.gte(since))
                    .count(db)
                    .await?,
                audit_logs: audit_log::Entity::find()
                    .filter(audit_log::Column::CreatedAt.gte(since))
                    .count(db)
                    .await?,
            },
            system: ProcessInfo {
                uptime_seconds: self.uptime_seconds(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                os: std::env::consts::OS.to_string(),
                arch: std::env::consts::ARCH.to_string(),
            },
            generated_at: Utc::now(),
            generated_by: requested_by,
        })
    }

    /// Snapshot of every active row, read inside one transaction.
    #[instrument(skip(self))]
    pub async fn backup(&self, created_by: Uuid, include_audit_logs: bool) -> Result<Backup, ServiceError> {
        let txn = self.db.begin().await?;
        let target_rows = target::Entity::find()
            .filter(target::Column::IsActive.eq(true))
            .filter(target::Column::DeletedAt.is_null())
            .all(&txn)
            .await?;
        let target_ids: Vec<Uuid> = target_rows.iter().map(|t| t.id).collect();

        let data = BackupData {
            committees: committee::Entity::find()
                .filter(committee::Column::IsActive.eq(true))
                .filter(committee::Column::DeletedAt.is_null())
                .order_by_asc(committee::Column::Code)
                .all(&txn)
                .await?,
            checkposts: checkpost::Entity::find()
                .filter(checkpost::Column::IsActive.eq(true))
                .filter(checkpost::Column::DeletedAt.is_null())
                .all(&txn)
                .await?,
            receipts: receipt::Entity::find()
                .filter(receipt::Column::IsActive.eq(true))
                .filter(receipt::Column::DeletedAt.is_null())
                .order_by_asc(receipt::Column::Date)
                .all(&txn)
                .await?,
            monthly_targets: monthly_target::Entity::find()
                .filter(monthly_target::Column::TargetId.is_in(target_ids.clone()))
                .all(&txn)
                .await?,
            checkpost_targets: checkpost_target::Entity::find()
                .filter(checkpost_target::Column::TargetId.is_in(target_ids))
                .all(&txn)
                .await?,
            targets: target_rows,
            users: user::Entity::find()
                .filter(user::Column::IsActive.eq(true))
                .filter(user::Column::DeletedAt.is_null())
                .all(&txn)
                .await?,
            system_configs: system_config::Entity::find()
                .filter(system_config::Column::IsActive.eq(true))
                .all(&txn)
                .await?,
            audit_logs: if include_audit_logs {
                Some(
                    audit_log::Entity::find()
                        .order_by_asc(audit_log::Column::CreatedAt)
                        .all(&txn)
                        .await?,
                )
            } else {
                None
            },
        };
        txn.commit().await?;

        let counts = EntityCounts {
            committees: data.committees.len() as u64,
            checkposts: data.checkposts.len() as u64,
            receipts: data.receipts.len() as u64,
            targets: data.targets.len() as u64,
            users: data.users.len() as u64,
            audit_logs: data.audit_logs.as_ref().map_or(0, |a| a.len() as u64),
        };
        let backup = Backup {
            metadata: BackupMetadata {
                created_by,
                created_at: Utc::now(),
                version: BACKUP_VERSION.to_string(),
                include_audit_logs,
                checksum: checksum(&data)?,
                counts,
            },
            data,
        };
        info!(
            receipts = backup.metadata.counts.receipts,
            checksum = %backup.metadata.checksum,
            "backup created"
        );
        Ok(backup)
    }

    pub async fn list_config(&self) -> Result<Vec<ConfigEntry>, ServiceError> {
        Ok(system_config::Entity::find()
            .filter(system_config::Column::IsActive.eq(true))
            .order_by_asc(system_config::Column::Category)
            .order_by_asc(system_config::Column::Key)
            .all(&*self.db)
            .await?
            .into_iter()
            .map(ConfigEntry::from)
            .collect())
    }

    #[instrument(skip(self, request, actor))]
    pub async fn upsert_config(
        &self,
        key: &str,
        request: UpsertConfigRequest,
        actor: &Actor,
    ) -> Result<ConfigEntry, ServiceError> {
        request.validate()?;
        let key = key.trim();
        if key.is_empty() || key.len() > 100 {
            return Err(ServiceError::ValidationError(
                "key: Configuration key must be 1 to 100 characters".to_string(),
            ));
        }
        if !request.data_type.accepts(&request.value) {
            return Err(ServiceError::ValidationError(format!(
                "value: '{}' is not a valid {:?} value",
                request.value, request.data_type
            )));
        }

        let txn = self.db.begin().await?;
        let existing = system_config::Entity::find()
            .filter(system_config::Column::Key.eq(key))
            .one(&txn)
            .await?;
        let now = Utc::now();

        let saved = match existing {
            Some(current) => {
                let before = current.clone();
                let mut active: system_config::ActiveModel = current.into();
                active.value = Set(request.value);
                active.data_type = Set(request.data_type);
                active.category = Set(request.category);
                active.description = Set(request.description);
                active.is_active = Set(true);
                active.updated_at = Set(now);
                let saved = active.update(&txn).await?;
                actor
                    .audit(
                        AuditEntry::new("system_configs", saved.id, AuditAction::Update)
                            .old(&before)
                            .new_values(&saved),
                    )
                    .write(&txn)
                    .await?;
                saved
            }
            None => {
                let saved = system_config::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    key: Set(key.to_string()),
                    value: Set(request.value),
                    data_type: Set(request.data_type),
                    category: Set(request.category),
                    description: Set(request.description),
                    is_active: Set(true),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(&txn)
                .await?;
                actor
                    .audit(AuditEntry::new("system_configs", saved.id, AuditAction::Create).new_values(&saved))
                    .write(&txn)
                    .await?;
                saved
            }
        };
        txn.commit().await?;

        info!(key = %saved.key, "system config saved");
        Ok(saved.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_stable_hex_sha256() {
        let a = checksum(&serde_json::json!({"receipts": [1, 2, 3]})).unwrap();
        let b = checksum(&serde_json::json!({"receipts": [1, 2, 3]})).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, checksum(&serde_json::json!({"receipts": [1, 2]})).unwrap());
    }

    #[test]
    fn upsert_defaults() {
        let req: UpsertConfigRequest = serde_json::from_str(r#"{"value":"10"}"#).unwrap();
        assert_eq!(req.data_type, ConfigDataType::Text);
        assert_eq!(req.category, "general");
        let typed: UpsertConfigRequest =
            serde_json::from_str(r#"{"value":"10","dataType":"NUMBER","category":"reports"}"#).unwrap();
        assert_eq!(typed.data_type, ConfigDataType::Number);
    }
}

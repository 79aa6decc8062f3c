use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Yearly collection target of a committee
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "targets")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub committee_id: Uuid,
    pub financial_year: String,
    #[sea_orm(column_type = "Decimal(Some((16, 2)))")]
    pub yearly_target: Decimal,
    #[sea_orm(nullable)]
    pub description: Option<String>,
    #[sea_orm(nullable)]
    pub created_by: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sea_orm(nullable)]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::committee::Entity",
        from = "Column::CommitteeId",
        to = "super::committee::Column::Id"
    )]
    Committee,
    #[sea_orm(has_many = "super::monthly_target::Entity")]
    MonthlyTargets,
    #[sea_orm(has_many = "super::checkpost_target::Entity")]
    CheckpostTargets,
}

impl Related<super::committee::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Committee.def()
    }
}

impl Related<super::monthly_target::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MonthlyTargets.def()
    }
}

impl Related<super::checkpost_target::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CheckpostTargets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

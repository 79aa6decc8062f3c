use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Market-fee receipt as stored.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "receipts")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub book_number: String,
    pub receipt_number: String,
    pub date: DateTime<Utc>,
    pub trader_name: String,
    pub payee_name: String,
    pub commodity: String,
    #[sea_orm(column_type = "Decimal(Some((16, 2)))")]
    pub transaction_value: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 2)))")]
    pub market_fee: Decimal,
    pub nature_of_receipt: NatureOfReceipt,
    #[sea_orm(nullable)]
    pub nature_of_receipt_other: Option<String>,
    pub collection_location: CollectionLocation,
    #[sea_orm(nullable)]
    pub collection_location_other: Option<String>,
    #[sea_orm(nullable)]
    pub supervisor_name: Option<String>,
    #[sea_orm(nullable)]
    pub remarks: Option<String>,
    pub financial_year: String,
    pub committee_id: Uuid,
    #[sea_orm(nullable)]
    pub checkpost_id: Option<Uuid>,
    #[sea_orm(nullable)]
    pub created_by: Option<Uuid>,
    #[sea_orm(nullable)]
    pub updated_by: Option<Uuid>,
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
    #[sea_orm(
        belongs_to = "super::checkpost::Entity",
        from = "Column::CheckpostId",
        to = "super::checkpost::Column::Id"
    )]
    Checkpost,
}

impl Related<super::committee::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Committee.def()
    }
}

impl Related<super::checkpost::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Checkpost.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Market fee proper versus any other receipt type
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
pub enum NatureOfReceipt {
    #[sea_orm(string_value = "MF")]
    #[serde(rename = "MF")]
    Mf,
    #[sea_orm(string_value = "OTHERS")]
    #[serde(rename = "OTHERS")]
    Others,
}

impl NatureOfReceipt {
    pub fn as_str(&self) -> &'static str {
        match self {
            NatureOfReceipt::Mf => "MF",
            NatureOfReceipt::Others => "OTHERS",
        }
    }
}

/// Where the fee was collected
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(12))")]
#[serde(rename_all = "UPPERCASE")]
pub enum CollectionLocation {
    #[sea_orm(string_value = "OFFICE")]
    Office,
    #[sea_orm(string_value = "CHECKPOST")]
    Checkpost,
    #[sea_orm(string_value = "SUPERVISOR")]
    Supervisor,
}

impl CollectionLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionLocation::Office => "OFFICE",
            CollectionLocation::Checkpost => "CHECKPOST",
            CollectionLocation::Supervisor => "SUPERVISOR",
        }
    }
}

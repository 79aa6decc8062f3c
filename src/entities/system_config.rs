use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "system_configs")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub key: String,
    #[sea_orm(column_type = "Text")]
    pub value: String,
    pub data_type: ConfigDataType,
    pub category: String,
    #[sea_orm(nullable)]
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfigDataType {
    #[sea_orm(string_value = "STRING")]
    #[serde(rename = "STRING")]
    Text,
    #[sea_orm(string_value = "NUMBER")]
    Number,
    #[sea_orm(string_value = "BOOLEAN")]
    Boolean,
    #[sea_orm(string_value = "JSON")]
    Json,
}

impl ConfigDataType {
    /// Whether `value` parses as this type.
    pub fn accepts(&self, value: &str) -> bool {
        match self {
            ConfigDataType::Text => true,
            ConfigDataType::Number => value.trim().parse::<f64>().map(f64::is_finite).unwrap_or(false),
            ConfigDataType::Boolean => matches!(value.trim(), "true" | "false"),
            ConfigDataType::Json => serde_json::from_str::<serde_json::Value>(value).is_ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_checked_against_declared_type() {
        assert!(ConfigDataType::Number.accepts("12.5"));
        assert!(!ConfigDataType::Number.accepts("twelve"));
        assert!(ConfigDataType::Boolean.accepts("false"));
        assert!(!ConfigDataType::Boolean.accepts("yes"));
        assert!(ConfigDataType::Json.accepts(r#"{"a":1}"#));
        assert!(!ConfigDataType::Json.accepts("{"));
        assert!(ConfigDataType::Text.accepts(""));
    }
}

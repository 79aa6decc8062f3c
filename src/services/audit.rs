//! Append-only audit trail for every mutation and session event.

use crate::entities::{audit_log, AuditAction};
use crate::middleware_helpers::ClientInfo;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ConnectionTrait, DbErr, Set};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

/// One audit row waiting to be written.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub table_name: &'static str,
    pub record_id: String,
    pub action: AuditAction,
    pub old_values: Option<serde_json::Value>,
    pub new_values: Option<serde_json::Value>,
    pub user_id: Option<Uuid>,
    pub client: Option<ClientInfo>,
}

impl AuditEntry {
    pub fn new(table_name: &'static str, record_id: impl ToString, action: AuditAction) -> Self {
        Self {
            table_name,
            record_id: record_id.to_string(),
            action,
            old_values: None,
            new_values: None,
            user_id: None,
            client: None,
        }
    }

    pub fn old<T: Serialize>(mut self, value: &T) -> Self {
        self.old_values = serde_json::to_value(value).ok();
        self
    }

    pub fn new_values<T: Serialize>(mut self, value: &T) -> Self {
        self.new_values = serde_json::to_value(value).ok();
        self
    }

    pub fn by(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn from_client(mut self, client: &ClientInfo) -> Self {
        self.client = Some(client.clone());
        self
    }

    /// Writes the row on the given connection or open transaction.
    pub async fn write<C: ConnectionTrait>(self, conn: &C) -> Result<audit_log::Model, DbErr> {
        debug!(
            table = self.table_name,
            record_id = %self.record_id,
            action = ?self.action,
            "writing audit entry"
        );
        let (ip_address, user_agent) = match self.client {
            Some(client) => (client.ip_address, client.user_agent),
            None => (None, None),
        };
        audit_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            table_name: Set(self.table_name.to_string()),
            record_id: Set(self.record_id),
            action: Set(self.action),
            old_values: Set(self.old_values.map(|v| v.to_string())),
            new_values: Set(self.new_values.map(|v| v.to_string())),
            user_id: Set(self.user_id),
            ip_address: Set(ip_address),
            user_agent: Set(user_agent),
            created_at: Set(Utc::now()),
        }
        .insert(conn)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_captures_snapshots_and_actor() {
        let user = Uuid::new_v4();
        let client = ClientInfo {
            ip_address: Some("10.0.0.1".into()),
            user_agent: Some("curl/8".into()),
        };
        let entry = AuditEntry::new("receipts", "r-1", AuditAction::Update)
            .old(&json!({"marketFee": "10.00"}))
            .new_values(&json!({"marketFee": "12.00"}))
            .by(user)
            .from_client(&client);

        assert_eq!(entry.table_name, "receipts");
        assert_eq!(entry.user_id, Some(user));
        assert_eq!(entry.old_values, Some(json!({"marketFee": "10.00"})));
        assert_eq!(
            entry.client.and_then(|c| c.ip_address).as_deref(),
            Some("10.0.0.1")
        );
    }
}

use crate::auth::{hash_password, verify_password, AuthError, AuthService};
use crate::entities::{user, AuditAction, Role};
use crate::errors::ServiceError;
use crate::middleware_helpers::ClientInfo;
use crate::services::{Actor, AuditEntry};
use chrono::{DateTime, Utc};
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    pub name: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[serde(default)]
    pub role: Role,
}

/// Public profile; never carries the password hash
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    /// The `{id, email, name, role}` subset returned with a token.
    fn brief(model: &user::Model) -> Self {
        Self {
            id: model.id,
            email: model.email.clone(),
            name: model.name.clone(),
            role: model.role,
            last_login: None,
            created_at: None,
        }
    }
}

impl From<user::Model> for UserProfile {
    fn from(model: user::Model) -> Self {
        Self {
            last_login: model.last_login,
            created_at: Some(model.created_at),
            ..Self::brief(&model)
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub token: String,
    pub expires_in: i64,
    pub user: UserProfile,
}

#[derive(Clone)]
pub struct UserService {
    db: Arc<DatabaseConnection>,
    auth: Arc<AuthService>,
}

impl UserService {
    pub fn new(db: Arc<DatabaseConnection>, auth: Arc<AuthService>) -> Self {
        Self { db, auth }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<user::Model>, ServiceError> {
        Ok(user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(&*self.db)
            .await?)
    }

    fn respond_with_token(&self, account: &user::Model) -> Result<TokenResponse, ServiceError> {
        let issued = self.auth.issue_token(account)?;
        Ok(TokenResponse {
            token: issued.token,
            expires_in: issued.expires_in,
            user: UserProfile::brief(account),
        })
    }

    #[instrument(skip(self, request, client), fields(email = %request.email))]
    pub async fn login(
        &self,
        request: LoginRequest,
        client: ClientInfo,
    ) -> Result<TokenResponse, ServiceError> {
        request.validate()?;
        let email = request.email.trim().to_lowercase();

        let account = self
            .find_by_email(&email)
            .await?
            .filter(|u| u.is_active && u.deleted_at.is_none());
        let account = match account {
            Some(account) if verify_password(&request.password, &account.password_hash) => account,
            _ => {
                counter!("amc.auth.login.failure", 1);
                warn!("login rejected");
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        let response = self.respond_with_token(&account)?;

        let txn = self.db.begin().await?;
        let mut touched: user::ActiveModel = account.clone().into();
        touched.last_login = Set(Some(Utc::now()));
        touched.update(&txn).await?;
        AuditEntry::new("users", account.id, AuditAction::Login)
            .new_values(&serde_json::json!({ "email": account.email }))
            .by(account.id)
            .from_client(&client)
            .write(&txn)
            .await?;
        txn.commit().await?;

        counter!("amc.auth.login.success", 1);
        info!(user_id = %account.id, "login succeeded");
        Ok(response)
    }

    /// Creates an account and signs it in. Role gating happens at the handler.
    #[instrument(skip(self, request, client), fields(email = %request.email, role = %request.role))]
    pub async fn register(
        &self,
        request: RegisterRequest,
        client: ClientInfo,
    ) -> Result<TokenResponse, ServiceError> {
        request.validate()?;
        let email = request.email.trim().to_lowercase();

        if self.find_by_email(&email).await?.is_some() {
            return Err(ServiceError::Conflict(
                "User with this email already exists".to_string(),
            ));
        }

        let password_hash = hash_password(&request.password)?;
        let now = Utc::now();

        let txn = self.db.begin().await?;
        let created = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email),
            name: Set(request.name.trim().to_string()),
            password_hash: Set(password_hash),
            role: Set(request.role),
            is_active: Set(true),
            last_login: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
        }
        .insert(&txn)
        .await?;
        AuditEntry::new("users", created.id, AuditAction::Create)
            .new_values(&UserProfile::brief(&created))
            .by(created.id)
            .from_client(&client)
            .write(&txn)
            .await?;
        txn.commit().await?;

        info!(user_id = %created.id, "user registered");
        self.respond_with_token(&created)
    }

    #[instrument(skip(self, actor))]
    pub async fn logout(&self, actor: &Actor) -> Result<(), ServiceError> {
        actor
            .audit(AuditEntry::new("users", actor.user_id, AuditAction::Logout))
            .write(&*self.db)
            .await?;
        info!(user_id = %actor.user_id, "logout recorded");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn me(&self, user_id: Uuid) -> Result<UserProfile, ServiceError> {
        user::Entity::find_by_id(user_id)
            .filter(user::Column::IsActive.eq(true))
            .filter(user::Column::DeletedAt.is_null())
            .one(&*self.db)
            .await?
            .map(UserProfile::from)
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn register(email: &str, password: &str, name: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.into(),
            name: name.into(),
            password: password.into(),
            role: Role::default(),
        }
    }

    #[test]
    fn register_rules() {
        assert!(register("clerk@amc.gov.in", "longenough", "Clerk").validate().is_ok());

        let err: ServiceError = register("not-an-email", "short", "").validate().unwrap_err().into();
        assert_matches!(err, ServiceError::ValidationErrors(ref messages) if messages == &vec![
            "email: Invalid email format".to_string(),
            "name: Name is required".to_string(),
            "password: Password must be at least 8 characters".to_string(),
        ]);
    }

    #[test]
    fn role_defaults_to_user() {
        let request: RegisterRequest = serde_json::from_value(serde_json::json!({
            "email": "a@b.in", "name": "A", "password": "12345678"
        }))
        .unwrap();
        assert_eq!(request.role, Role::User);
    }

    #[test]
    fn brief_profile_omits_timestamps() {
        let now = Utc::now();
        let model = user::Model {
            id: Uuid::new_v4(),
            email: "a@b.in".into(),
            name: "A".into(),
            password_hash: "x".into(),
            role: Role::Manager,
            is_active: true,
            last_login: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        let json = serde_json::to_value(UserProfile::brief(&model)).unwrap();
        assert_eq!(json["role"], "MANAGER");
        assert!(json.get("createdAt").is_none());
        assert!(json.get("passwordHash").is_none());
    }
}

/*!
 * # Authentication and Authorization Module
 *
 * Bearer-token identity for the market-fee API:
 *
 * - HS256 JWTs carrying `{sub, email, role}` with a fixed expiry window
 * - argon2 password hashing (PHC strings)
 * - middleware that resolves the token to a still-active user and
 *   optionally checks role membership
 */

use crate::config::AppConfig;
use crate::entities::{user, Role};
use crate::errors::{ErrorResponse, ServiceError};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Claim structure for JWT tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,   // Subject (user ID)
    pub email: String, // User's email at issue time
    pub role: Role,    // Access level at issue time
    pub jti: String,   // JWT ID
    pub iat: i64,      // Issued at time
    pub exp: i64,      // Expiration time
}

/// Authenticated user resolved from a bearer token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub token_id: String,
}

impl AuthUser {
    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.contains(&self.role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }
}

/// Roles allowed to change committees, checkposts and targets
pub const MANAGE_ROLES: &[Role] = &[Role::Admin, Role::Manager];
/// Roles allowed to record and edit receipts
pub const RECEIPT_WRITE_ROLES: &[Role] = &[Role::Admin, Role::Manager, Role::User];
pub const ADMIN_ONLY: &[Role] = &[Role::Admin];

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_expiration: Duration,
}

impl AuthConfig {
    pub fn new(jwt_secret: String, token_expiration: Duration) -> Self {
        Self {
            jwt_secret,
            token_expiration,
        }
    }
}

impl From<&AppConfig> for AuthConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self::new(
            cfg.jwt_secret.clone(),
            Duration::from_secs(cfg.jwt_expiration_secs),
        )
    }
}

/// A freshly signed access token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_in: i64,
}

/// Authentication service that handles token issuance and validation
#[derive(Debug, Clone)]
pub struct AuthService {
    pub config: AuthConfig,
    pub db: Arc<DatabaseConnection>,
}

impl AuthService {
    pub fn new(config: AuthConfig, db: Arc<DatabaseConnection>) -> Self {
        Self { config, db }
    }

    /// Signs an access token for the user
    pub fn issue_token(&self, user: &user::Model) -> Result<IssuedToken, AuthError> {
        let now = Utc::now();
        let expires = now
            + ChronoDuration::from_std(self.config.token_expiration)
                .map_err(|_| AuthError::InternalError("Invalid token duration".to_string()))?;

        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            role: user.role,
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: expires.timestamp(),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))?;

        Ok(IssuedToken {
            token,
            expires_in: self.config.token_expiration.as_secs() as i64,
        })
    }

    /// Validate a JWT token and extract the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })
    }

    /// Validates the token and confirms the account is still active.
    pub async fn authenticate(&self, token: &str) -> Result<AuthUser, AuthError> {
        let claims = self.validate_token(token)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

        let account = user::Entity::find_by_id(user_id)
            .filter(user::Column::IsActive.eq(true))
            .filter(user::Column::DeletedAt.is_null())
            .one(&*self.db)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        let account = account.ok_or(AuthError::UserInactive)?;

        Ok(AuthUser {
            user_id,
            email: account.email,
            role: account.role,
            token_id: claims.jti,
        })
    }

    /// Resolves the `Authorization: Bearer` header, if present
    pub async fn authenticate_headers(&self, headers: &HeaderMap) -> Result<AuthUser, AuthError> {
        let token = bearer_token(headers).ok_or(AuthError::MissingToken)?;
        self.authenticate(token).await
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Hashes a password into an argon2 PHC string
pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::HashError(e.to_string()))
}

/// Checks a password against a stored PHC string; malformed hashes never match
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!("Stored password hash could not be parsed: {}", e);
            false
        }
    }
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing token")]
    MissingToken,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("User is inactive or no longer exists")]
    UserInactive,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingToken
            | Self::InvalidCredentials
            | Self::InvalidToken
            | Self::TokenExpired
            | Self::UserInactive => StatusCode::UNAUTHORIZED,
            Self::InsufficientPermissions => StatusCode::FORBIDDEN,
            Self::TokenCreation(_) | Self::DatabaseError(_) | Self::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn public_message(&self) -> &'static str {
        match self {
            Self::MissingToken => "Authentication required",
            Self::InvalidCredentials => "Invalid credentials",
            Self::InvalidToken => "Invalid authentication token",
            Self::TokenExpired => "Authentication token has expired",
            Self::UserInactive => "User account is inactive",
            Self::InsufficientPermissions => "Insufficient permissions",
            Self::TokenCreation(_) | Self::DatabaseError(_) | Self::InternalError(_) => {
                "Internal server error"
            }
        }
    }
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err.status_code() {
            StatusCode::UNAUTHORIZED => ServiceError::Unauthorized(err.public_message().into()),
            StatusCode::FORBIDDEN => ServiceError::Forbidden(err.public_message().into()),
            _ => ServiceError::InternalError(err.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "authentication failure");
        } else {
            debug!(error = %self, "request rejected by auth");
        }

        let body = ErrorResponse {
            success: false,
            error: self.public_message().to_string(),
            errors: None,
            request_id: crate::tracing::current_request_id().map(|rid| rid.to_string()),
            timestamp: Utc::now().to_rfc3339(),
        };

        (status, Json(body)).into_response()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AuthError::MissingToken)
    }
}

/// Role middleware to check if a user holds one of the allowed roles
pub async fn role_middleware(
    State(allowed): State<Vec<Role>>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or(AuthError::MissingToken)?;

    if !user.has_any_role(&allowed) {
        warn!(user_id = %user.user_id, role = %user.role, "role check failed");
        return Err(AuthError::InsufficientPermissions);
    }

    Ok(next.run(request).await)
}

/// Authentication middleware that extracts and validates bearer tokens
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let auth_service = match request.extensions().get::<Arc<AuthService>>() {
        Some(service) => service.clone(),
        None => {
            return AuthError::InternalError("Authentication service not available".into())
                .into_response();
        }
    };

    match auth_service.authenticate_headers(request.headers()).await {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
    fn with_roles(self, roles: &[Role]) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(auth_middleware))
    }

    fn with_roles(self, roles: &[Role]) -> Self {
        self.layer(axum::middleware::from_fn_with_state(
            roles.to_vec(),
            role_middleware,
        ))
        .with_auth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(expiration: Duration) -> AuthService {
        AuthService::new(
            AuthConfig::new("s".repeat(64), expiration),
            Arc::new(DatabaseConnection::Disconnected),
        )
    }

    fn account(role: Role) -> user::Model {
        user::Model {
            id: Uuid::new_v4(),
            email: "clerk@amc.example".into(),
            name: "Clerk".into(),
            password_hash: String::new(),
            role,
            is_active: true,
            last_login: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    #[test]
    fn issued_token_round_trips_claims() {
        let svc = service(Duration::from_secs(3600));
        let user = account(Role::Manager);
        let issued = svc.issue_token(&user).unwrap();
        assert_eq!(issued.expires_in, 3600);

        let claims = svc.validate_token(&issued.token).unwrap();
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.role, Role::Manager);
        assert_eq!(claims.email, "clerk@amc.example");
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let issuer = service(Duration::from_secs(3600));
        let token = issuer.issue_token(&account(Role::User)).unwrap().token;

        let other = AuthService::new(
            AuthConfig::new("t".repeat(64), Duration::from_secs(3600)),
            Arc::new(DatabaseConnection::Disconnected),
        );
        assert!(matches!(
            other.validate_token(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn expired_token_reports_expiry() {
        let svc = service(Duration::from_secs(3600));
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            email: "old@amc.example".into(),
            role: Role::User,
            jti: "j".into(),
            iat: Utc::now().timestamp() - 7200,
            exp: Utc::now().timestamp() - 3600,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(svc.config.jwt_secret.as_bytes()),
        )
        .unwrap();
        assert!(matches!(
            svc.validate_token(&token),
            Err(AuthError::TokenExpired)
        ));
    }

    #[test]
    fn password_hash_verifies_only_the_original() {
        let hash = hash_password("s3cret-pass").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("s3cret-pass", &hash));
        assert!(!verify_password("wrong-pass", &hash));
        assert!(!verify_password("s3cret-pass", "not-a-phc-string"));
    }

    #[test]
    fn bearer_header_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
        headers.insert(header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
        headers.insert(header::AUTHORIZATION, "Bearer abc.def".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc.def"));
    }

    #[test]
    fn auth_errors_map_to_status_codes() {
        assert_eq!(
            AuthError::TokenExpired.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::InsufficientPermissions.status_code(),
            StatusCode::FORBIDDEN
        );
        let svc_err: ServiceError = AuthError::InsufficientPermissions.into();
        assert_eq!(svc_err.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn role_sets() {
        let user = AuthUser {
            user_id: Uuid::new_v4(),
            email: "v@amc.example".into(),
            role: Role::Viewer,
            token_id: "t".into(),
        };
        assert!(!user.has_any_role(RECEIPT_WRITE_ROLES));
        assert!(!user.is_admin());
        assert!(MANAGE_ROLES.contains(&Role::Manager));
    }
}

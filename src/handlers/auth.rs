use crate::{
    auth::AuthUser,
    entities::Role,
    errors::ServiceError,
    handlers::common::created,
    middleware_helpers::ClientInfo,
    services::{
        users::{LoginRequest, RegisterRequest, TokenResponse, UserProfile},
        Actor,
    },
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use tracing::warn;

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    summary = "Log in",
    description = "Exchanges email and password for a bearer token",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = ApiResponse<TokenResponse>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 401, description = "Invalid credentials", body = crate::errors::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<TokenResponse> {
    let token = state.services.users.login(payload, client).await?;
    Ok(Json(ApiResponse::success(token).with_message("Login successful")))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    summary = "Register a user",
    description = "Open registration for USER and VIEWER accounts; ADMIN and MANAGER accounts need an administrator's bearer token",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered successfully", body = ApiResponse<TokenResponse>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 403, description = "Elevated role requested without an administrator token", body = crate::errors::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::errors::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    client: ClientInfo,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TokenResponse>>), ServiceError> {
    if matches!(payload.role, Role::Admin | Role::Manager) {
        let caller = state.auth.authenticate_headers(&headers).await.ok();
        if !caller.as_ref().is_some_and(AuthUser::is_admin) {
            warn!(role = %payload.role, "elevated registration refused");
            return Err(ServiceError::Forbidden(
                "Only administrators can create ADMIN or MANAGER accounts".to_string(),
            ));
        }
    }
    let token = state.services.users.register(payload, client).await?;
    Ok(created(token, "User registered successfully"))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    summary = "Log out",
    description = "Records the logout in the audit trail; tokens simply expire",
    responses(
        (status = 200, description = "Logged out"),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "auth"
)]
pub async fn logout(
    State(state): State<AppState>,
    user: AuthUser,
    client: ClientInfo,
) -> ApiResult<()> {
    state.services.users.logout(&Actor::new(&user, client)).await?;
    Ok(Json(ApiResponse::success(()).with_message("Logged out successfully")))
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    summary = "Current user",
    responses(
        (status = 200, description = "Profile of the authenticated user", body = ApiResponse<UserProfile>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "auth"
)]
pub async fn me(State(state): State<AppState>, user: AuthUser) -> ApiResult<UserProfile> {
    let profile = state.services.users.me(user.user_id).await?;
    Ok(Json(ApiResponse::success(profile)))
}

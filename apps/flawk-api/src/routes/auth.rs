//! Auth routes: registration, password login, token rotation and logout.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::auth::password::{hash_password, verify_password};
use crate::auth::tokens;
use crate::error::{ApiError, ApiErrorBody, FieldError, StoreError};
use crate::models::user::{permission, NewUser, UserResponse};
use crate::AppState;

/// Shortest password accepted at registration or password change.
pub const MIN_PASSWORD_LEN: usize = 8;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/token", post(rotate_token))
        .route("/auth/logout", post(logout))
        .route("/auth/logout-all", post(logout_all))
}

/// Mint a token for `user_id` and add it to the user's active list.
pub(crate) async fn issue_token(state: &AppState, user_id: &str) -> Result<String, ApiError> {
    let token = tokens::mint_access_token(&state.config.jwt_secret, user_id, state.config.access_token_ttl_secs)?;
    state.store.add_active_token(user_id, &token).await?;
    Ok(token)
}

pub(crate) fn password_errors(field: &str, password: &str) -> Option<FieldError> {
    (password.chars().count() < MIN_PASSWORD_LEN).then(|| FieldError {
        field: field.into(),
        message: format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
    })
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub token: String,
    pub user: UserResponse,
}

// ---------------------------------------------------------------------------
// POST /api/v1/auth/register
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = SessionResponse),
        (status = 400, description = "Validation error", body = ApiErrorBody),
        (status = 409, description = "Email already registered", body = ApiErrorBody),
    ),
)]
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let mut errors: Vec<FieldError> = Vec::new();

    let email = body.email.trim().to_lowercase();
    if !email.contains('@') || email.len() < 3 {
        errors.push(FieldError {
            field: "email".into(),
            message: "Invalid email address".into(),
        });
    }

    let phone = body
        .phone
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty());
    if let Some(ref p) = phone {
        if !p.chars().all(|c| c.is_ascii_digit() || c == '+' || c == ' ' || c == '-') {
            errors.push(FieldError {
                field: "phone".into(),
                message: "Phone may only contain digits, spaces, dashes and a leading +".into(),
            });
        }
    }

    errors.extend(password_errors("password", &body.password));

    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    let password_hash = hash_password(&body.password)?;

    let record = state
        .store
        .create_user(NewUser {
            id: flawk_common::id::prefixed_ulid(flawk_common::id::prefix::USER),
            email,
            phone,
            password_hash,
            permission_level: permission::USER,
            created_at: Utc::now(),
        })
        .await
        .map_err(|e| match e {
            StoreError::Conflict("email") => ApiError::conflict("Email is already registered"),
            other => ApiError::from(other),
        })?;

    let token = issue_token(&state, &record.user.id).await?;
    tracing::info!(user_id = %record.user.id, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            token,
            user: record.user.into(),
        }),
    ))
}

// ---------------------------------------------------------------------------
// POST /api/v1/auth/login
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = SessionResponse),
        (status = 401, description = "Invalid credentials", body = ApiErrorBody),
    ),
)]
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let email = body.email.trim().to_lowercase();
    let record = state
        .store
        .find_user_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    verify_password(&body.password, &record.user.password_hash)?;

    let token = issue_token(&state, &record.user.id).await?;
    tracing::debug!(user_id = %record.user.id, "user logged in");

    Ok(Json(SessionResponse {
        token,
        user: record.user.into(),
    }))
}

// ---------------------------------------------------------------------------
// POST /api/v1/auth/token
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub token: String,
}

/// Exchange the presented token for a fresh one. The old token stops working
/// on both HTTP and sockets.
#[utoipa::path(
    post,
    path = "/api/v1/auth/token",
    tag = "Auth",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Token rotated", body = TokenResponse),
        (status = 401, description = "Invalid token", body = ApiErrorBody),
    ),
)]
pub async fn rotate_token(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<TokenResponse>, ApiError> {
    let token = issue_token(&state, &user.user_id).await?;
    state.store.remove_active_token(&user.user_id, &user.token).await?;
    Ok(Json(TokenResponse { token }))
}

// ---------------------------------------------------------------------------
// POST /api/v1/auth/logout
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "Auth",
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Token revoked"),
        (status = 401, description = "Invalid token", body = ApiErrorBody),
    ),
)]
pub async fn logout(State(state): State<AppState>, user: AuthUser) -> Result<StatusCode, ApiError> {
    state.store.remove_active_token(&user.user_id, &user.token).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// POST /api/v1/auth/logout-all
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, ToSchema)]
pub struct LogoutAllResponse {
    pub revoked: u64,
}

/// Revoke every token the caller holds. Open sockets are closed on their next
/// packet.
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout-all",
    tag = "Auth",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "All tokens revoked", body = LogoutAllResponse),
        (status = 401, description = "Invalid token", body = ApiErrorBody),
    ),
)]
pub async fn logout_all(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<LogoutAllResponse>, ApiError> {
    let revoked = state.store.clear_active_tokens(&user.user_id).await?;
    tracing::info!(user_id = %user.user_id, revoked, "all tokens revoked");
    Ok(Json(LogoutAllResponse { revoked }))
}

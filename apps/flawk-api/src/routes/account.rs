//! The signed-in user's own account.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;

use super::auth::{issue_token, password_errors, TokenResponse};
use crate::auth::middleware::AuthUser;
use crate::auth::password::{hash_password, verify_password};
use crate::error::{ApiError, ApiErrorBody};
use crate::models::user::UserResponse;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/account", get(get_account))
        .route("/account/password", post(change_password))
}

#[utoipa::path(
    get,
    path = "/api/v1/account",
    tag = "Account",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Invalid token", body = ApiErrorBody),
    ),
)]
pub async fn get_account(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<UserResponse>, ApiError> {
    let record = state
        .store
        .find_user(&user.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(record.user.into()))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Change the password. Every existing token, including the one used for
/// this request, is revoked; the response carries the only valid token.
#[utoipa::path(
    post,
    path = "/api/v1/account/password",
    tag = "Account",
    security(("bearer" = [])),
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = TokenResponse),
        (status = 400, description = "Validation error", body = ApiErrorBody),
        (status = 401, description = "Wrong current password", body = ApiErrorBody),
    ),
)]
pub async fn change_password(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    if let Some(err) = password_errors("new_password", &body.new_password) {
        return Err(ApiError::validation(vec![err]));
    }

    let record = state
        .store
        .find_user(&user.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    verify_password(&body.current_password, &record.user.password_hash)?;

    let password_hash = hash_password(&body.new_password)?;
    state.store.update_password(&user.user_id, &password_hash).await?;

    let token = issue_token(&state, &user.user_id).await?;
    tracing::info!(user_id = %user.user_id, "password changed, tokens revoked");

    Ok(Json(TokenResponse { token }))
}

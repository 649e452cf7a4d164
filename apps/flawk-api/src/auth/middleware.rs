//! Bearer token extraction for HTTP routes.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::error::{ApiError, GatewayError};
use crate::models::user::permission;
use crate::AppState;

/// Authenticated user extracted from the `Authorization: Bearer <jwt>` header.
///
/// Runs the same checks as the socket authenticator, so a token removed from
/// the user's active list is refused here too.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    /// The raw bearer token, needed for logout and rotation.
    pub token: String,
    pub permission_level: i32,
}

impl AuthUser {
    /// Reject with 403 unless the caller is an admin.
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if permission::is_admin(self.permission_level) {
            Ok(())
        } else {
            Err(ApiError::forbidden("Admin permission required"))
        }
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthorized("Invalid Authorization header format"))?;

        let record = state.authenticator.resolve(token).await.map_err(|e| match e {
            GatewayError::Store(err) => ApiError::from(err),
            other => {
                tracing::debug!(reason = %other, "bearer token rejected");
                ApiError::unauthorized("Invalid or expired token")
            }
        })?;

        Ok(AuthUser {
            user_id: record.user.id,
            token: token.to_string(),
            permission_level: record.user.permission_level,
        })
    }
}

//! Admin endpoints over the live socket registry.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::error::{ApiError, ApiErrorBody};
use crate::gateway::fanout::Target;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/{user_id}/online", get(user_online))
        .route("/sockets/message", post(send_message))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OnlineResponse {
    pub online: bool,
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}/online",
    tag = "Sockets",
    security(("bearer" = [])),
    params(("user_id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "Whether the user has an identified socket open", body = OnlineResponse),
        (status = 403, description = "Admin only", body = ApiErrorBody),
    ),
)]
pub async fn user_online(
    State(state): State<AppState>,
    user: AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<OnlineResponse>, ApiError> {
    user.require_admin()?;
    Ok(Json(OnlineResponse {
        online: state.fanout.is_online(&user_id),
    }))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SocketMessageRequest {
    pub user_id: Option<String>,
    pub connection_id: Option<String>,
    /// Event name the client receives the data under.
    pub channel: String,
    #[schema(value_type = Object)]
    pub data: Value,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SocketMessageResponse {
    pub delivered: usize,
}

/// Push `data` to one user's sockets or to a single connection. Exactly one
/// of `user_id` and `connection_id` must be given.
#[utoipa::path(
    post,
    path = "/api/v1/sockets/message",
    tag = "Sockets",
    security(("bearer" = [])),
    request_body = SocketMessageRequest,
    responses(
        (status = 200, description = "Message queued", body = SocketMessageResponse),
        (status = 400, description = "Bad target", body = ApiErrorBody),
        (status = 403, description = "Admin only", body = ApiErrorBody),
    ),
)]
pub async fn send_message(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<SocketMessageRequest>,
) -> Result<Json<SocketMessageResponse>, ApiError> {
    user.require_admin()?;

    let channel = body.channel.trim();
    if channel.is_empty() {
        return Err(ApiError::bad_request("channel is required"));
    }

    let target = match (body.user_id, body.connection_id) {
        (Some(user_id), None) => Target::User(user_id),
        (None, Some(connection_id)) => Target::Connection(connection_id),
        _ => {
            return Err(ApiError::bad_request(
                "Exactly one of user_id or connection_id is required",
            ))
        }
    };

    let delivered = state.fanout.message(&target, channel, body.data);
    Ok(Json(SocketMessageResponse { delivered }))
}

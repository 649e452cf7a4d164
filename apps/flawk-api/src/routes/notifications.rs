//! Persisted notifications. Creating one also pushes it live to every socket
//! the recipient has open.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use utoipa::{IntoParams, ToSchema};

use crate::auth::middleware::AuthUser;
use crate::error::{ApiError, ApiErrorBody, FieldError};
use crate::gateway::events::LiveNotification;
use crate::gateway::fanout::Target;
use crate::models::notification::{NewNotification, Notification};
use crate::AppState;

/// Fixed page size for the notification list.
pub const NOTIFICATIONS_PER_PAGE: u32 = 10;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list_notifications).post(create_notification))
        .route("/notifications/read-all", post(mark_all_read))
        .route("/notifications/{notification_id}/read", post(mark_read))
}

// ---------------------------------------------------------------------------
// GET /api/v1/notifications
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListNotificationsParams {
    /// Zero-based page index.
    pub page: Option<u32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListNotificationsResponse {
    pub notifications: Vec<Notification>,
    pub total: u64,
    pub unread: u64,
    pub has_more: bool,
}

#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    tag = "Notifications",
    security(("bearer" = [])),
    params(ListNotificationsParams),
    responses(
        (status = 200, description = "Page of notifications, newest first", body = ListNotificationsResponse),
        (status = 400, description = "Malformed query string", body = ApiErrorBody),
        (status = 401, description = "Invalid token", body = ApiErrorBody),
    ),
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    user: AuthUser,
    params: Result<Query<ListNotificationsParams>, QueryRejection>,
) -> Result<Json<ListNotificationsResponse>, ApiError> {
    let Query(params) = params?;
    let page = params.page.unwrap_or(0);
    let result = state
        .store
        .list_notifications(&user.user_id, page, NOTIFICATIONS_PER_PAGE)
        .await?;

    let seen = (u64::from(page) + 1) * u64::from(NOTIFICATIONS_PER_PAGE);
    Ok(Json(ListNotificationsResponse {
        has_more: seen < result.total,
        notifications: result.notifications,
        total: result.total,
        unread: result.unread,
    }))
}

// ---------------------------------------------------------------------------
// POST /api/v1/notifications/{notification_id}/read
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/v1/notifications/{notification_id}/read",
    tag = "Notifications",
    security(("bearer" = [])),
    params(("notification_id" = String, Path, description = "Notification ID")),
    responses(
        (status = 204, description = "Marked as read"),
        (status = 404, description = "No such notification", body = ApiErrorBody),
    ),
)]
pub async fn mark_read(
    State(state): State<AppState>,
    user: AuthUser,
    Path(notification_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state
        .store
        .mark_notification_read(&user.user_id, &notification_id)
        .await?
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found("Notification not found"))
    }
}

// ---------------------------------------------------------------------------
// POST /api/v1/notifications/read-all
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, ToSchema)]
pub struct MarkAllReadResponse {
    pub updated: u64,
}

#[utoipa::path(
    post,
    path = "/api/v1/notifications/read-all",
    tag = "Notifications",
    security(("bearer" = [])),
    responses((status = 200, description = "All notifications read", body = MarkAllReadResponse)),
)]
pub async fn mark_all_read(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<MarkAllReadResponse>, ApiError> {
    let updated = state.store.mark_all_read(&user.user_id).await?;
    Ok(Json(MarkAllReadResponse { updated }))
}

// ---------------------------------------------------------------------------
// POST /api/v1/notifications
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateNotificationRequest {
    pub user_id: String,
    /// Display style on the client, e.g. `info`, `success`, `warning`.
    pub kind: String,
    pub title: String,
    pub description: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub payload: Option<Value>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateNotificationResponse {
    pub notification: Notification,
    /// Number of open sockets the live copy was queued for.
    pub delivered: usize,
}

#[utoipa::path(
    post,
    path = "/api/v1/notifications",
    tag = "Notifications",
    security(("bearer" = [])),
    request_body = CreateNotificationRequest,
    responses(
        (status = 201, description = "Notification stored and pushed", body = CreateNotificationResponse),
        (status = 403, description = "Admin only", body = ApiErrorBody),
        (status = 404, description = "Unknown recipient", body = ApiErrorBody),
    ),
)]
pub async fn create_notification(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<CreateNotificationRequest>,
) -> Result<(StatusCode, Json<CreateNotificationResponse>), ApiError> {
    user.require_admin()?;

    let title = body.title.trim().to_string();
    let kind = body.kind.trim().to_string();
    let mut errors = Vec::new();
    if title.is_empty() {
        errors.push(FieldError {
            field: "title".into(),
            message: "Title is required".into(),
        });
    }
    if kind.is_empty() {
        errors.push(FieldError {
            field: "kind".into(),
            message: "Kind is required".into(),
        });
    }
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    if state.store.find_user(&body.user_id).await?.is_none() {
        return Err(ApiError::not_found("User not found"));
    }

    let payload = json!({
        "title": title,
        "description": body.description,
        "data": body.payload.unwrap_or(Value::Null),
    });
    let notification = state
        .store
        .push_notification(NewNotification::new(&body.user_id, &kind, payload))
        .await?;

    // Stored first; the live push is best effort.
    let mut live = LiveNotification::new(title).with_kind(kind);
    if let Some(description) = body.description {
        live = live.with_description(description);
    }
    let delivered = state.fanout.notify(&Target::User(body.user_id), &live);

    tracing::debug!(
        notification_id = %notification.id,
        sender = %user.user_id,
        delivered,
        "notification created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateNotificationResponse {
            notification,
            delivered,
        }),
    ))
}

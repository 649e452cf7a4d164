use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::db::schema::notifications;

/// A persisted notification. Owned by the store; the gateway only pushes a
/// live copy to whoever happens to be connected.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, ToSchema)]
#[diesel(table_name = notifications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub is_read: bool,
    pub kind: String,
    #[schema(value_type = Object)]
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = notifications)]
pub struct NewNotification {
    pub id: String,
    pub user_id: String,
    pub is_read: bool,
    pub kind: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

impl NewNotification {
    pub fn new(user_id: &str, kind: &str, payload: Value) -> Self {
        Self {
            id: flawk_common::id::prefixed_ulid(flawk_common::id::prefix::NOTIFICATION),
            user_id: user_id.to_string(),
            is_read: false,
            kind: kind.to_string(),
            payload,
            created_at: Utc::now(),
        }
    }
}

impl From<NewNotification> for Notification {
    fn from(n: NewNotification) -> Self {
        Self {
            id: n.id,
            user_id: n.user_id,
            is_read: n.is_read,
            kind: n.kind,
            payload: n.payload,
            created_at: n.created_at,
        }
    }
}

/// One page of a user's notifications, newest first.
#[derive(Debug, Serialize, ToSchema)]
pub struct NotificationPage {
    pub notifications: Vec<Notification>,
    pub total: u64,
    pub unread: u64,
}

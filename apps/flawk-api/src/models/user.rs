use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::schema::users;

/// Permission tiers. Lower numbers mean more privilege.
pub mod permission {
    pub const SUPER_ADMIN: i32 = 1;
    pub const ADMIN: i32 = 10;
    pub const USER: i32 = 100;

    /// Returns true for any tier at or above admin.
    pub fn is_admin(level: i32) -> bool {
        level <= ADMIN
    }
}

/// Full user row from the database.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: String,
    pub email: String,
    pub phone: Option<String>,
    pub password_hash: String,
    pub permission_level: i32,
    pub created_at: DateTime<Utc>,
}

/// Insertable struct for creating a new user.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: String,
    pub email: String,
    pub phone: Option<String>,
    pub password_hash: String,
    pub permission_level: i32,
    pub created_at: DateTime<Utc>,
}

/// A user together with the tokens that are currently allowed to act for it.
///
/// A signed, unexpired token is only honoured while it is present in
/// `active_tokens`; logout and password changes remove entries.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub user: User,
    pub active_tokens: Vec<String>,
}

impl UserRecord {
    pub fn has_active_token(&self, token: &str) -> bool {
        self.active_tokens.iter().any(|t| t == token)
    }
}

/// Public-facing user response (no sensitive fields).
#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub phone: Option<String>,
    pub permission_level: i32,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            phone: u.phone,
            permission_level: u.permission_level,
            created_at: u.created_at,
        }
    }
}

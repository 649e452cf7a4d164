//! Postgres-backed [`UserStore`] using diesel-async.

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, OptionalExtension};
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use scoped_futures::ScopedFutureExt;

use super::pool::DbPool;
use super::schema::{notifications, user_tokens, users};
use super::store::UserStore;
use crate::error::StoreError;
use crate::models::notification::{NewNotification, Notification, NotificationPage};
use crate::models::user::{NewUser, User, UserRecord};

pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Load the active tokens for `user` and bundle them into a record.
async fn with_tokens(conn: &mut AsyncPgConnection, user: User) -> Result<UserRecord, StoreError> {
    let active_tokens: Vec<String> = user_tokens::table
        .filter(user_tokens::user_id.eq(&user.id))
        .order(user_tokens::created_at.asc())
        .select(user_tokens::token)
        .load(conn)
        .await?;
    Ok(UserRecord {
        user,
        active_tokens,
    })
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, new_user: NewUser) -> Result<UserRecord, StoreError> {
        let mut conn = self.pool.get().await?;

        let user: User = diesel::insert_into(users::table)
            .values(&new_user)
            .returning(User::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, ref info) => {
                    if info.constraint_name().unwrap_or("").contains("email") {
                        StoreError::Conflict("email")
                    } else {
                        StoreError::Conflict("user")
                    }
                }
                other => StoreError::from(other),
            })?;

        Ok(UserRecord {
            user,
            active_tokens: Vec::new(),
        })
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError> {
        let mut conn = self.pool.get().await?;

        let user: Option<User> = users::table
            .find(user_id)
            .select(User::as_select())
            .first(&mut conn)
            .await
            .optional()?;

        match user {
            Some(user) => Ok(Some(with_tokens(&mut conn, user).await?)),
            None => Ok(None),
        }
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let mut conn = self.pool.get().await?;

        let user: Option<User> = users::table
            .filter(users::email.eq(email))
            .select(User::as_select())
            .first(&mut conn)
            .await
            .optional()?;

        match user {
            Some(user) => Ok(Some(with_tokens(&mut conn, user).await?)),
            None => Ok(None),
        }
    }

    async fn add_active_token(&self, user_id: &str, token: &str) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await?;

        diesel::insert_into(user_tokens::table)
            .values((
                user_tokens::token.eq(token),
                user_tokens::user_id.eq(user_id),
                user_tokens::created_at.eq(Utc::now()),
            ))
            .on_conflict(user_tokens::token)
            .do_nothing()
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    async fn remove_active_token(&self, user_id: &str, token: &str) -> Result<bool, StoreError> {
        let mut conn = self.pool.get().await?;

        let removed = diesel::delete(
            user_tokens::table
                .filter(user_tokens::token.eq(token))
                .filter(user_tokens::user_id.eq(user_id)),
        )
        .execute(&mut conn)
        .await?;

        Ok(removed > 0)
    }

    async fn clear_active_tokens(&self, user_id: &str) -> Result<u64, StoreError> {
        let mut conn = self.pool.get().await?;

        let removed = diesel::delete(user_tokens::table.filter(user_tokens::user_id.eq(user_id)))
            .execute(&mut conn)
            .await?;

        Ok(removed as u64)
    }

    async fn update_password(&self, user_id: &str, password_hash: &str) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await?;

        conn.transaction::<_, StoreError, _>(|conn| {
            async move {
                diesel::update(users::table.find(user_id))
                    .set(users::password_hash.eq(password_hash))
                    .execute(conn)
                    .await?;

                diesel::delete(user_tokens::table.filter(user_tokens::user_id.eq(user_id)))
                    .execute(conn)
                    .await?;

                Ok(())
            }
            .scope_boxed()
        })
        .await
    }

    async fn push_notification(&self, notification: NewNotification) -> Result<Notification, StoreError> {
        let mut conn = self.pool.get().await?;

        let row: Notification = diesel::insert_into(notifications::table)
            .values(&notification)
            .returning(Notification::as_returning())
            .get_result(&mut conn)
            .await?;

        Ok(row)
    }

    async fn list_notifications(
        &self,
        user_id: &str,
        page: u32,
        per_page: u32,
    ) -> Result<NotificationPage, StoreError> {
        let mut conn = self.pool.get().await?;

        let total: i64 = notifications::table
            .filter(notifications::user_id.eq(user_id))
            .count()
            .get_result(&mut conn)
            .await?;

        let unread: i64 = notifications::table
            .filter(notifications::user_id.eq(user_id))
            .filter(notifications::is_read.eq(false))
            .count()
            .get_result(&mut conn)
            .await?;

        let rows: Vec<Notification> = notifications::table
            .filter(notifications::user_id.eq(user_id))
            .order((notifications::created_at.desc(), notifications::id.desc()))
            .offset(i64::from(page) * i64::from(per_page))
            .limit(i64::from(per_page))
            .select(Notification::as_select())
            .load(&mut conn)
            .await?;

        Ok(NotificationPage {
            notifications: rows,
            total: total as u64,
            unread: unread as u64,
        })
    }

    async fn mark_notification_read(&self, user_id: &str, notification_id: &str) -> Result<bool, StoreError> {
        let mut conn = self.pool.get().await?;

        let updated = diesel::update(
            notifications::table
                .filter(notifications::id.eq(notification_id))
                .filter(notifications::user_id.eq(user_id)),
        )
        .set(notifications::is_read.eq(true))
        .execute(&mut conn)
        .await?;

        Ok(updated > 0)
    }

    async fn mark_all_read(&self, user_id: &str) -> Result<u64, StoreError> {
        let mut conn = self.pool.get().await?;

        let updated = diesel::update(
            notifications::table
                .filter(notifications::user_id.eq(user_id))
                .filter(notifications::is_read.eq(false)),
        )
        .set(notifications::is_read.eq(true))
        .execute(&mut conn)
        .await?;

        Ok(updated as u64)
    }
}

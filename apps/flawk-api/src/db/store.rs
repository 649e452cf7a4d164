use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::StoreError;
use crate::models::notification::{NewNotification, Notification, NotificationPage};
use crate::models::user::{NewUser, User, UserRecord};

/// Persistent storage for users, their active tokens, and notifications.
///
/// Backed by Postgres in production and an in-memory map in tests or when no
/// `DATABASE_URL` is configured.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new user. Fails with [`StoreError::Conflict`] if the email is taken.
    async fn create_user(&self, new_user: NewUser) -> Result<UserRecord, StoreError>;

    async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;

    async fn add_active_token(&self, user_id: &str, token: &str) -> Result<(), StoreError>;

    /// Returns whether the token was present.
    async fn remove_active_token(&self, user_id: &str, token: &str) -> Result<bool, StoreError>;

    /// Revoke every active token. Returns how many were removed.
    async fn clear_active_tokens(&self, user_id: &str) -> Result<u64, StoreError>;

    /// Replace the password hash and revoke every active token.
    async fn update_password(&self, user_id: &str, password_hash: &str) -> Result<(), StoreError>;

    /// Append to the user's notification list.
    async fn push_notification(&self, notification: NewNotification) -> Result<Notification, StoreError>;

    /// `page` is zero-based. Newest notifications come first.
    async fn list_notifications(
        &self,
        user_id: &str,
        page: u32,
        per_page: u32,
    ) -> Result<NotificationPage, StoreError>;

    /// Returns false if the notification does not exist or belongs to someone else.
    async fn mark_notification_read(&self, user_id: &str, notification_id: &str) -> Result<bool, StoreError>;

    /// Returns the number of notifications that changed.
    async fn mark_all_read(&self, user_id: &str) -> Result<u64, StoreError>;
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryData {
    users: HashMap<String, UserRecord>,
    /// Per-user notifications in insertion order (oldest first).
    notifications: HashMap<String, Vec<Notification>>,
}

pub struct MemoryStore {
    data: Mutex<MemoryData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(MemoryData::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, new_user: NewUser) -> Result<UserRecord, StoreError> {
        let mut data = self.data.lock();
        if data.users.values().any(|r| r.user.email == new_user.email) {
            return Err(StoreError::Conflict("email"));
        }
        if data.users.contains_key(&new_user.id) {
            return Err(StoreError::Conflict("user"));
        }

        let record = UserRecord {
            user: User {
                id: new_user.id,
                email: new_user.email,
                phone: new_user.phone,
                password_hash: new_user.password_hash,
                permission_level: new_user.permission_level,
                created_at: new_user.created_at,
            },
            active_tokens: Vec::new(),
        };
        data.users.insert(record.user.id.clone(), record.clone());
        Ok(record)
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.data.lock().users.get(user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self
            .data
            .lock()
            .users
            .values()
            .find(|r| r.user.email == email)
            .cloned())
    }

    async fn add_active_token(&self, user_id: &str, token: &str) -> Result<(), StoreError> {
        if let Some(record) = self.data.lock().users.get_mut(user_id) {
            if !record.has_active_token(token) {
                record.active_tokens.push(token.to_string());
            }
        }
        Ok(())
    }

    async fn remove_active_token(&self, user_id: &str, token: &str) -> Result<bool, StoreError> {
        let mut data = self.data.lock();
        let Some(record) = data.users.get_mut(user_id) else {
            return Ok(false);
        };
        let before = record.active_tokens.len();
        record.active_tokens.retain(|t| t != token);
        Ok(record.active_tokens.len() != before)
    }

    async fn clear_active_tokens(&self, user_id: &str) -> Result<u64, StoreError> {
        let mut data = self.data.lock();
        let Some(record) = data.users.get_mut(user_id) else {
            return Ok(0);
        };
        let removed = record.active_tokens.len() as u64;
        record.active_tokens.clear();
        Ok(removed)
    }

    async fn update_password(&self, user_id: &str, password_hash: &str) -> Result<(), StoreError> {
        if let Some(record) = self.data.lock().users.get_mut(user_id) {
            record.user.password_hash = password_hash.to_string();
            record.active_tokens.clear();
        }
        Ok(())
    }

    async fn push_notification(&self, notification: NewNotification) -> Result<Notification, StoreError> {
        let notification = Notification::from(notification);
        self.data
            .lock()
            .notifications
            .entry(notification.user_id.clone())
            .or_default()
            .push(notification.clone());
        Ok(notification)
    }

    async fn list_notifications(
        &self,
        user_id: &str,
        page: u32,
        per_page: u32,
    ) -> Result<NotificationPage, StoreError> {
        let data = self.data.lock();
        let Some(list) = data.notifications.get(user_id) else {
            return Ok(NotificationPage {
                notifications: Vec::new(),
                total: 0,
                unread: 0,
            });
        };

        let notifications = list
            .iter()
            .rev()
            .skip(page as usize * per_page as usize)
            .take(per_page as usize)
            .cloned()
            .collect();

        Ok(NotificationPage {
            notifications,
            total: list.len() as u64,
            unread: list.iter().filter(|n| !n.is_read).count() as u64,
        })
    }

    async fn mark_notification_read(&self, user_id: &str, notification_id: &str) -> Result<bool, StoreError> {
        let mut data = self.data.lock();
        let found = data
            .notifications
            .get_mut(user_id)
            .and_then(|list| list.iter_mut().find(|n| n.id == notification_id));
        match found {
            Some(n) => {
                n.is_read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_all_read(&self, user_id: &str) -> Result<u64, StoreError> {
        let mut data = self.data.lock();
        let mut changed = 0;
        if let Some(list) = data.notifications.get_mut(user_id) {
            for n in list.iter_mut().filter(|n| !n.is_read) {
                n.is_read = true;
                changed += 1;
            }
        }
        Ok(changed)
    }
}

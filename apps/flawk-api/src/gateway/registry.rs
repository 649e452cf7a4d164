//! Registry of live socket connections and the identity attached to each.
//!
//! Lookups are linear scans over the open connections; there is no secondary
//! index. A connection disappears from every lookup as soon as [`remove`]
//! returns.
//!
//! [`remove`]: ConnectionRegistry::remove

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use dashmap::DashMap;
use flawk_common::id::{prefix, prefixed_ulid};
use tokio::sync::mpsc;

use crate::models::user::{permission, UserRecord};

use super::events::ServerFrame;

/// Outbound frames queued per connection before new ones are dropped.
pub const OUTBOUND_CAPACITY: usize = 256;

pub type OutboundSender = mpsc::Sender<Arc<ServerFrame>>;
pub type OutboundReceiver = mpsc::Receiver<Arc<ServerFrame>>;

/// Authenticated user information cached on a connection for its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub permission_level: i32,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        permission::is_admin(self.permission_level)
    }
}

impl From<&UserRecord> for Identity {
    fn from(record: &UserRecord) -> Self {
        Self {
            id: record.user.id.clone(),
            email: Some(record.user.email.clone()),
            phone: record.user.phone.clone(),
            permission_level: record.user.permission_level,
        }
    }
}

/// Where a connection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unauthenticated,
    Authenticated,
    Closed,
}

/// Result of [`ConnectionRegistry::attach_identity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    /// This call set the identity.
    Attached,
    /// An identity was already present and has been left untouched.
    AlreadyAttached,
    /// The connection was removed before the identity could be attached.
    Closed,
}

struct ConnectionEntry {
    identity: OnceLock<Identity>,
    sender: OutboundSender,
    connected_at: Instant,
}

/// A snapshot of one connection, used by the fan-out to deliver frames.
#[derive(Clone)]
pub struct ConnectionHandle {
    pub connection_id: String,
    pub identity: Option<Identity>,
    sender: OutboundSender,
}

impl ConnectionHandle {
    /// Queue a frame without waiting. Returns false if the queue is full or
    /// the connection task has already gone away.
    pub fn try_send(&self, frame: Arc<ServerFrame>) -> bool {
        match self.sender.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(
                    connection_id = %self.connection_id,
                    "outbound queue full, dropping frame"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

/// Shared registry of all open socket connections.
pub struct ConnectionRegistry {
    connections: DashMap<String, ConnectionEntry>,
    /// Number of open connections with an identity attached.
    identified: AtomicUsize,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            identified: AtomicUsize::new(0),
        }
    }

    /// Register a freshly accepted connection. Returns its id and the queue
    /// the connection task drains into the socket.
    pub fn register(&self) -> (String, OutboundReceiver) {
        let connection_id = prefixed_ulid(prefix::CONNECTION);
        let (sender, receiver) = mpsc::channel(OUTBOUND_CAPACITY);
        self.connections.insert(
            connection_id.clone(),
            ConnectionEntry {
                identity: OnceLock::new(),
                sender,
                connected_at: Instant::now(),
            },
        );
        (connection_id, receiver)
    }

    /// Drop a connection. Returns the identity it carried, if any.
    pub fn remove(&self, connection_id: &str) -> Option<Identity> {
        let (_, entry) = self.connections.remove(connection_id)?;
        tracing::trace!(
            %connection_id,
            lifetime_ms = entry.connected_at.elapsed().as_millis() as u64,
            "connection removed"
        );
        let identity = entry.identity.into_inner();
        if identity.is_some() {
            self.identified.fetch_sub(1, Ordering::Relaxed);
        }
        identity
    }

    /// Attach an identity to a connection, at most once.
    ///
    /// The shard guard is held while the slot is set, so this cannot race
    /// with [`remove`](Self::remove): a connection closed while its
    /// authentication was in flight stays closed.
    pub fn attach_identity(&self, connection_id: &str, identity: Identity) -> AttachOutcome {
        let Some(entry) = self.connections.get(connection_id) else {
            return AttachOutcome::Closed;
        };
        match entry.identity.set(identity) {
            Ok(()) => {
                self.identified.fetch_add(1, Ordering::Relaxed);
                AttachOutcome::Attached
            }
            Err(_) => AttachOutcome::AlreadyAttached,
        }
    }

    pub fn identity(&self, connection_id: &str) -> Option<Identity> {
        self.connections
            .get(connection_id)
            .and_then(|entry| entry.identity.get().cloned())
    }

    pub fn state(&self, connection_id: &str) -> ConnectionState {
        match self.connections.get(connection_id) {
            None => ConnectionState::Closed,
            Some(entry) if entry.identity.get().is_some() => ConnectionState::Authenticated,
            Some(_) => ConnectionState::Unauthenticated,
        }
    }

    /// True iff any open connection is identified as `user_id`.
    pub fn is_online(&self, user_id: &str) -> bool {
        self.connections.iter().any(|entry| {
            entry
                .identity
                .get()
                .is_some_and(|identity| identity.id == user_id)
        })
    }

    /// Every open connection identified as `user_id`.
    pub fn connections_for_user(&self, user_id: &str) -> Vec<ConnectionHandle> {
        self.collect(|identity| identity.is_some_and(|i| i.id == user_id))
    }

    /// The connection with exactly this id, if it is still open.
    pub fn connection(&self, connection_id: &str) -> Option<ConnectionHandle> {
        self.connections
            .get(connection_id)
            .map(|entry| handle(connection_id, &entry))
    }

    /// Every open connection whose identity is at or above admin level.
    pub fn admin_connections(&self) -> Vec<ConnectionHandle> {
        self.collect(|identity| identity.is_some_and(Identity::is_admin))
    }

    /// Number of open connections, identified or not.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Number of open connections that have an identity attached.
    pub fn online_count(&self) -> usize {
        self.identified.load(Ordering::Relaxed)
    }

    fn collect(&self, filter: impl Fn(Option<&Identity>) -> bool) -> Vec<ConnectionHandle> {
        self.connections
            .iter()
            .filter(|entry| filter(entry.identity.get()))
            .map(|entry| handle(entry.key(), &entry))
            .collect()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn handle(connection_id: &str, entry: &ConnectionEntry) -> ConnectionHandle {
    ConnectionHandle {
        connection_id: connection_id.to_string(),
        identity: entry.identity.get().cloned(),
        sender: entry.sender.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(id: &str, permission_level: i32) -> Identity {
        Identity {
            id: id.to_string(),
            email: Some(format!("{id}@example.com")),
            phone: None,
            permission_level,
        }
    }

    #[test]
    fn register_starts_unauthenticated() {
        let registry = ConnectionRegistry::new();
        let (id, _rx) = registry.register();
        assert!(id.starts_with("cx_"));
        assert_eq!(registry.state(&id), ConnectionState::Unauthenticated);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.online_count(), 0);
        assert!(registry.identity(&id).is_none());
    }

    #[test]
    fn identity_is_attached_once() {
        let registry = ConnectionRegistry::new();
        let (id, _rx) = registry.register();

        assert_eq!(
            registry.attach_identity(&id, identity("usr_a", permission::USER)),
            AttachOutcome::Attached
        );
        assert_eq!(
            registry.attach_identity(&id, identity("usr_b", permission::ADMIN)),
            AttachOutcome::AlreadyAttached
        );

        let attached = registry.identity(&id).unwrap();
        assert_eq!(attached.id, "usr_a");
        assert_eq!(attached.permission_level, permission::USER);
        assert_eq!(registry.state(&id), ConnectionState::Authenticated);
        assert_eq!(registry.online_count(), 1);
    }

    #[test]
    fn attach_after_remove_reports_closed() {
        let registry = ConnectionRegistry::new();
        let (id, _rx) = registry.register();
        assert!(registry.remove(&id).is_none());

        assert_eq!(
            registry.attach_identity(&id, identity("usr_a", permission::USER)),
            AttachOutcome::Closed
        );
        assert_eq!(registry.state(&id), ConnectionState::Closed);
        assert!(registry.is_empty());
        assert_eq!(registry.online_count(), 0);
    }

    #[test]
    fn is_online_has_no_stale_positives() {
        let registry = ConnectionRegistry::new();
        let (a, _rx_a) = registry.register();
        let (b, _rx_b) = registry.register();
        registry.attach_identity(&a, identity("usr_1", permission::USER));
        registry.attach_identity(&b, identity("usr_1", permission::USER));

        assert!(registry.is_online("usr_1"));
        assert!(!registry.is_online("usr_2"));
        assert_eq!(registry.connections_for_user("usr_1").len(), 2);

        assert_eq!(registry.remove(&a).unwrap().id, "usr_1");
        assert!(registry.is_online("usr_1"));
        assert_eq!(registry.online_count(), 1);

        registry.remove(&b);
        assert!(!registry.is_online("usr_1"));
        assert!(registry.connections_for_user("usr_1").is_empty());
        assert_eq!(registry.online_count(), 0);
    }

    #[test]
    fn unauthenticated_connections_are_not_online() {
        let registry = ConnectionRegistry::new();
        let (id, _rx) = registry.register();
        assert!(registry.connection(&id).is_some());
        assert!(registry.connection(&id).unwrap().identity.is_none());
        assert!(registry.admin_connections().is_empty());
        assert!(registry.connection("cx_missing").is_none());
    }

    #[test]
    fn admin_connections_filters_by_level() {
        let registry = ConnectionRegistry::new();
        let (root, _r1) = registry.register();
        let (admin, _r2) = registry.register();
        let (user, _r3) = registry.register();
        let (_anon, _r4) = registry.register();
        registry.attach_identity(&root, identity("usr_root", permission::SUPER_ADMIN));
        registry.attach_identity(&admin, identity("usr_admin", permission::ADMIN));
        registry.attach_identity(&user, identity("usr_user", permission::USER));

        let mut ids: Vec<String> = registry
            .admin_connections()
            .into_iter()
            .map(|h| h.connection_id)
            .collect();
        ids.sort();
        let mut expected = vec![root, admin];
        expected.sort();
        assert_eq!(ids, expected);
    }

    #[test]
    fn try_send_reports_closed_receiver() {
        let registry = ConnectionRegistry::new();
        let (id, rx) = registry.register();
        let handle = registry.connection(&id).unwrap();
        let frame = Arc::new(ServerFrame::message("ping", serde_json::json!({})));

        assert!(handle.try_send(frame.clone()));
        drop(rx);
        assert!(!handle.try_send(frame));
    }
}

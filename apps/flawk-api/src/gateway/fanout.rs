//! Fire-and-forget delivery of live events to connected sockets.
//!
//! Targets are resolved against the [`ConnectionRegistry`] at call time and
//! each matching connection gets the frame queued without waiting. Nothing is
//! persisted, retried, or queued for clients that are offline: callers that
//! need durability write to the store before calling in here.

use std::sync::Arc;

use serde_json::Value;

use super::events::{LiveNotification, ServerFrame};
use super::registry::{ConnectionHandle, ConnectionRegistry};

/// Selects which connections receive an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Every connection identified as this user (e.g. several browser tabs).
    User(String),
    /// Exactly one connection, identified or not.
    Connection(String),
    /// Every connection whose identity is at or above admin level.
    Admins,
}

/// Cloneable handle stored in `AppState`.
#[derive(Clone)]
pub struct Fanout {
    registry: Arc<ConnectionRegistry>,
}

impl Fanout {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.registry.is_online(user_id)
    }

    /// Push a `notification` event. Returns how many connections it was queued for.
    pub fn notify(&self, target: &Target, notification: &LiveNotification) -> usize {
        self.deliver(target, ServerFrame::notification(notification))
    }

    /// Push `data` on an arbitrary named channel.
    pub fn message(&self, target: &Target, channel: &str, data: Value) -> usize {
        self.deliver(target, ServerFrame::message(channel, data))
    }

    pub fn notify_admins(&self, notification: &LiveNotification) -> usize {
        self.notify(&Target::Admins, notification)
    }

    fn resolve(&self, target: &Target) -> Vec<ConnectionHandle> {
        match target {
            Target::User(user_id) => self.registry.connections_for_user(user_id),
            Target::Connection(connection_id) => {
                self.registry.connection(connection_id).into_iter().collect()
            }
            Target::Admins => self.registry.admin_connections(),
        }
    }

    fn deliver(&self, target: &Target, frame: ServerFrame) -> usize {
        let handles = self.resolve(target);
        if handles.is_empty() {
            tracing::trace!(?target, event = %frame.event, "no connections for target");
            return 0;
        }

        let frame = Arc::new(frame);
        let delivered = handles
            .iter()
            .filter(|handle| handle.try_send(frame.clone()))
            .count();

        tracing::debug!(?target, event = %frame.event, delivered, "fanned out");
        delivered
    }
}

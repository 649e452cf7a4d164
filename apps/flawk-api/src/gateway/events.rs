//! Socket wire format: inbound commands and outbound frames.
//!
//! Every frame is a JSON text message. Inbound frames look like
//! `{"event": "test", "data": {"token": "..."}, "ack": 3}`; outbound frames
//! look like `{"event": "notification", "data": {...}}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Event names
// ---------------------------------------------------------------------------

pub const EVENT_INIT: &str = "init";
pub const EVENT_TEST: &str = "test";
pub const EVENT_NOTIFICATION_TEST: &str = "notification_test";
pub const EVENT_NOTIFICATION: &str = "notification";
pub const EVENT_ACK: &str = "ack";

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// A frame received from the client.
#[derive(Debug, Deserialize)]
pub struct ClientFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
    /// When present, the server answers with an `ack` frame carrying this id.
    #[serde(default)]
    pub ack: Option<u64>,
}

impl ClientFrame {
    /// The credential carried in `data.token`, if any.
    pub fn token(&self) -> Option<&str> {
        self.data
            .get("token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
    }
}

/// The closed set of commands a client may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientEvent {
    Init,
    Test,
    NotificationTest,
}

impl ClientEvent {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            EVENT_INIT => Some(Self::Init),
            EVENT_TEST => Some(Self::Test),
            EVENT_NOTIFICATION_TEST => Some(Self::NotificationTest),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => EVENT_INIT,
            Self::Test => EVENT_TEST,
            Self::NotificationTest => EVENT_NOTIFICATION_TEST,
        }
    }
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

/// Body of a `notification` event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveNotification {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
}

impl LiveNotification {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            kind: "info".to_string(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }
}

/// A frame sent from the server to the client.
#[derive(Debug, Clone, Serialize)]
pub struct ServerFrame {
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ack: Option<u64>,
    pub data: Value,
}

impl ServerFrame {
    /// Build a `notification` event.
    pub fn notification(notification: &LiveNotification) -> Self {
        Self {
            event: EVENT_NOTIFICATION.to_string(),
            ack: None,
            data: serde_json::to_value(notification).unwrap_or_default(),
        }
    }

    /// Build an event on an arbitrary named channel.
    pub fn message(channel: &str, data: Value) -> Self {
        Self {
            event: channel.to_string(),
            ack: None,
            data,
        }
    }

    /// Build an acknowledgement for a client frame.
    pub fn ack(ack: Option<u64>, data: Value) -> Self {
        Self {
            event: EVENT_ACK.to_string(),
            ack,
            data,
        }
    }
}

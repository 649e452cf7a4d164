//! Command handlers for packets that passed authentication.

use serde_json::json;

use crate::models::notification::NewNotification;
use crate::AppState;

use super::events::{ClientEvent, LiveNotification, ServerFrame};
use super::fanout::Target;
use super::registry::Identity;

/// Kind stored on notifications created by `notification_test`.
pub const TEST_NOTIFICATION_KIND: &str = "test";

/// Run one command. Returns the frame to write straight back to the caller,
/// if any.
///
/// `init` is always acknowledged; the other commands only answer when the
/// client asked for an ack.
pub async fn handle_event(
    state: &AppState,
    connection_id: &str,
    identity: &Identity,
    event: ClientEvent,
    ack: Option<u64>,
) -> Option<ServerFrame> {
    tracing::trace!(%connection_id, user_id = %identity.id, event = event.as_str(), "socket event");

    match event {
        ClientEvent::Init => Some(ServerFrame::ack(
            ack,
            json!({ "success": true, "buildNumber": state.config.build_number }),
        )),
        ClientEvent::Test => {
            let notification = LiveNotification::new("Test notification")
                .with_description("Socket connection is working")
                .with_kind("success");
            let delivered = state
                .fanout
                .notify(&Target::Connection(connection_id.to_string()), &notification);
            ack.map(|id| ServerFrame::ack(Some(id), json!({ "success": delivered > 0 })))
        }
        ClientEvent::NotificationTest => notification_test(state, identity, ack).await,
    }
}

/// Persist a notification for the caller, then push it live to all of their
/// connections. A storage failure is reported in the ack and does not close
/// the socket.
async fn notification_test(state: &AppState, identity: &Identity, ack: Option<u64>) -> Option<ServerFrame> {
    let live = LiveNotification::new("New notification")
        .with_description("This notification was saved to your account");
    let payload = json!({ "title": live.title, "description": live.description });

    let stored = match state
        .store
        .push_notification(NewNotification::new(&identity.id, TEST_NOTIFICATION_KIND, payload))
        .await
    {
        Ok(stored) => stored,
        Err(e) => {
            tracing::warn!(err = %e, user_id = %identity.id, "failed to persist test notification");
            return ack.map(|id| ServerFrame::ack(Some(id), json!({ "success": false })));
        }
    };

    state.fanout.notify(&Target::User(identity.id.clone()), &live);
    ack.map(|id| ServerFrame::ack(Some(id), json!({ "success": true, "id": stored.id })))
}

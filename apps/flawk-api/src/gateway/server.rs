//! WebSocket upgrade handler and per-connection event loop.

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};

use crate::error::GatewayError;
use crate::AppState;

use super::events::{ClientEvent, ClientFrame, LiveNotification, ServerFrame};
use super::handler::handle_event;
use super::registry::Identity;

type WsSink = SplitSink<WebSocket, Message>;

pub fn router() -> Router<AppState> {
    Router::new().route("/socket", get(ws_upgrade))
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: AppState) {
    let (connection_id, mut outbound_rx) = state.sockets.register();
    let (mut ws_tx, mut ws_rx) = socket.split();
    tracing::debug!(%connection_id, "socket connected");

    // Frames on one connection are processed strictly in order: the next read
    // only happens once the current frame's auth check and handler finish.
    let failure = loop {
        tokio::select! {
            msg = ws_rx.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    match process_frame(&state, &connection_id, text.as_str()).await {
                        Ok(Some(reply)) => {
                            if send_frame(&mut ws_tx, &reply).await.is_err() {
                                break None;
                            }
                        }
                        Ok(None) => {}
                        Err(err) => break Some(err),
                    }
                }
                Some(Ok(Message::Binary(_))) => break Some(GatewayError::InvalidFrame),
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) | None => break None,
                Some(Err(e)) => {
                    tracing::debug!(?e, %connection_id, "ws read error");
                    break None;
                }
            },

            Some(frame) = outbound_rx.recv() => {
                if send_frame(&mut ws_tx, &frame).await.is_err() {
                    break None;
                }
            }
        }
    };

    // Leave every lookup before anything else so no fan-out targets a closing socket.
    let identity = state.sockets.remove(&connection_id);

    if let Some(err) = failure {
        tracing::debug!(%connection_id, reason = %err, "terminating socket");
        let _ = send_close(&mut ws_tx, err.close_code(), err.close_reason()).await;
    }

    match identity {
        Some(identity) => {
            tracing::info!(
                %connection_id,
                user_id = %identity.id,
                online = state.sockets.online_count(),
                "client disconnected"
            );
            if state.config.socket_debug {
                state
                    .fanout
                    .notify_admins(&LiveNotification::new("Client disconnected").with_description(describe(&identity)));
            }
        }
        None => tracing::debug!(%connection_id, "anonymous socket closed"),
    }
}

/// Authenticate and dispatch one text frame.
async fn process_frame(
    state: &AppState,
    connection_id: &str,
    text: &str,
) -> Result<Option<ServerFrame>, GatewayError> {
    let frame: ClientFrame = serde_json::from_str(text).map_err(|_| GatewayError::InvalidFrame)?;

    let auth = state
        .authenticator
        .authenticate(&state.sockets, connection_id, frame.token())
        .await?;

    if auth.first_identification {
        tracing::info!(
            %connection_id,
            user_id = %auth.identity.id,
            online = state.sockets.online_count(),
            "client identified"
        );
        if state.config.socket_debug {
            state
                .fanout
                .notify_admins(&LiveNotification::new("Client connected").with_description(describe(&auth.identity)));
        }
    }

    let event = ClientEvent::parse(&frame.event).ok_or_else(|| GatewayError::UnknownEvent(frame.event.clone()))?;
    Ok(handle_event(state, connection_id, &auth.identity, event, frame.ack).await)
}

fn describe(identity: &Identity) -> String {
    match &identity.email {
        Some(email) => format!("{email} ({})", identity.id),
        None => identity.id.clone(),
    }
}

async fn send_frame(ws_tx: &mut WsSink, frame: &ServerFrame) -> Result<(), axum::Error> {
    let json = match serde_json::to_string(frame) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(?e, event = %frame.event, "failed to encode frame");
            return Ok(());
        }
    };
    ws_tx.send(Message::Text(json.into())).await
}

/// Send a WebSocket close frame with a code and reason.
async fn send_close(ws_tx: &mut WsSink, code: u16, reason: &str) -> Result<(), axum::Error> {
    ws_tx
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.to_string().into(),
        })))
        .await
}

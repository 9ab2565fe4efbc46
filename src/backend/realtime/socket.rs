/**
 * WebSocket Endpoint
 *
 * `GET /ws` upgrades an authenticated device to a real-time channel. Each
 * connection runs two tasks:
 *
 * - a writer that drains the connection's outbound queue into the socket
 * - a reader that parses client frames and runs them through `ChatService`
 *
 * Whichever task finishes first aborts the other. The writer finishes when
 * the Presence Registry drops the connection's handle (revocation, eviction,
 * or a reconnect of the same device).
 *
 * # Client Frames
 *
 * ```json
 * {"type": "sendMessage", "target": "...", "isGroup": false, "content": "hi"}
 * {"type": "markSeen", "messageId": "..."}
 * {"type": "ping"}
 * ```
 */
use std::ops::ControlFlow;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::WeakUnboundedSender;

use crate::backend::middleware::AuthSession;
use crate::backend::realtime::presence::Connected;
use crate::backend::server::state::AppState;
use crate::shared::{ClientFrame, RealtimeEvent, SharedError};

/// Handle the WebSocket upgrade (GET /ws)
pub async fn ws_handler(State(state): State<AppState>, auth: AuthSession, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, auth))
}

/// Register the device with the Presence Registry, then confirm its session.
///
/// A revocation that lands between the upgrade and registration finds no
/// handle to close, so the session is checked again once the handle exists.
/// Returns `None` (with the handle removed) when the session is gone.
pub async fn attach_device(state: &AppState, auth: &AuthSession) -> Option<Connected> {
    let connected = state.presence.connect(auth.user_id, &auth.device_id).await;

    let live = match state.sessions.is_valid_session(auth.user_id, &auth.device_id).await {
        Ok(live) => live,
        Err(err) => {
            tracing::warn!("[Realtime] session check for {} failed: {}", auth.device_id, err);
            false
        }
    };
    if live {
        return Some(connected);
    }

    tracing::info!(
        "[Realtime] device {} of {} lost its session during upgrade",
        auth.device_id,
        auth.user_id
    );
    state
        .presence
        .disconnect(auth.user_id, &auth.device_id, connected.connection_id)
        .await;
    None
}

async fn handle_socket(mut socket: WebSocket, state: AppState, auth: AuthSession) {
    let Some(Connected {
        connection_id,
        mut receiver,
        replies,
        first_device,
    }) = attach_device(&state, &auth).await
    else {
        if let Ok(text) = serde_json::to_string(&RealtimeEvent::session_revoked(&auth.device_id)) {
            let _ = socket.send(Message::Text(text.into())).await;
        }
        let _ = socket.send(Message::Close(None)).await;
        return;
    };

    if first_device {
        state.events.announce_presence(auth.user_id, true, None).await;
    }

    let (mut sink, mut stream) = socket.split();

    let mut writer = tokio::spawn(async move {
        while let Some(event) = receiver.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!("[Realtime] failed to serialize event: {}", e);
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.send(Message::Close(None)).await;
    });

    let reader_state = state.clone();
    let reader_auth = auth.clone();
    let mut reader = tokio::spawn(async move {
        while let Some(Ok(message)) = stream.next().await {
            match message {
                Message::Text(text) => {
                    if handle_frame(&reader_state, &reader_auth, text.as_str(), &replies)
                        .await
                        .is_break()
                    {
                        break;
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }

    if let Some(last_seen) = state
        .presence
        .disconnect(auth.user_id, &auth.device_id, connection_id)
        .await
    {
        state
            .events
            .announce_presence(auth.user_id, false, Some(last_seen))
            .await;
    }
}

fn reply(replies: &WeakUnboundedSender<RealtimeEvent>, event: RealtimeEvent) {
    let sent = replies.upgrade().is_some_and(|tx| tx.send(event).is_ok());
    if !sent {
        tracing::warn!("[Realtime] reply dropped: connection closed");
    }
}

/// Run one client frame. `Break` ends the connection.
async fn handle_frame(
    state: &AppState,
    auth: &AuthSession,
    text: &str,
    replies: &WeakUnboundedSender<RealtimeEvent>,
) -> ControlFlow<()> {
    let frame = match serde_json::from_str::<ClientFrame>(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::debug!("[Realtime] bad frame from {}: {}", auth.device_id, e);
            reply(replies, RealtimeEvent::error(SharedError::from(e).to_string()));
            return ControlFlow::Continue(());
        }
    };

    if matches!(frame, ClientFrame::Ping) {
        reply(replies, RealtimeEvent::pong());
        return ControlFlow::Continue(());
    }

    match state.sessions.is_valid_session(auth.user_id, &auth.device_id).await {
        Ok(true) => {}
        Ok(false) => {
            reply(replies, RealtimeEvent::session_revoked(&auth.device_id));
            return ControlFlow::Break(());
        }
        Err(err) => {
            reply(replies, RealtimeEvent::error(err.message()));
            return ControlFlow::Continue(());
        }
    }

    let result = match frame {
        ClientFrame::SendMessage(request) => state
            .chat
            .send_message(auth.user_id, Some(&auth.device_id), request)
            .await
            .map(|view| reply(replies, RealtimeEvent::message(&view))),
        ClientFrame::MarkSeen { message_id } => state
            .chat
            .mark_seen(auth.user_id, message_id)
            .await
            .map(|_| ()),
        ClientFrame::Ping => Ok(()),
    };

    if let Err(err) = result {
        reply(replies, RealtimeEvent::error(err.message()));
    }
    ControlFlow::Continue(())
}

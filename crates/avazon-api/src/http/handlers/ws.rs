//! WebSocket endpoint for a live avatar creation session.
//!
//! `GET /api/v1/avatar/create/{id}/enter` upgrades the connection. The
//! first client frame must be `{"access_token": "..."}`; the socket is
//! closed if it is missing or invalid. After that:
//!
//! - client frames are `{object_type, event: chat|close|confirm, content}`
//!   and go to the session;
//! - every session event is forwarded as a JSON text frame;
//! - a ping is sent every 30 seconds.
//!
//! Disconnecting does not close the session. The client can reconnect
//! until it sends `close`/`confirm` or the session idles out.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use avazon_core::session::{CreationSession, EventScope, SessionEvent, SessionEventKind};
use avazon_infra::sqlite::SqliteCreationRepository;

use crate::http::handlers::parse_id;
use crate::state::AppState;

pub const PING_INTERVAL: Duration = Duration::from_secs(30);
const AUTH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct AuthFrame {
    access_token: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ClientEvent {
    Chat,
    Close,
    Confirm,
}

#[derive(Debug, Deserialize)]
struct ClientFrame {
    object_type: EventScope,
    event: ClientEvent,
    #[serde(default)]
    content: String,
}

type Session = Arc<CreationSession<SqliteCreationRepository>>;

pub async fn enter_session(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        match parse_id(&id) {
            Ok(id) => {
                let span = info_span!("creation_socket", session_id = %id);
                handle_socket(socket, state, id).instrument(span).await;
            }
            Err(e) => reject(socket, e.to_string()).await,
        }
    })
}

async fn handle_socket(socket: WebSocket, state: AppState, id: Uuid) {
    let (mut sender, mut receiver) = socket.split();

    let user_id = match authenticate(&mut receiver, &state).await {
        Ok(user_id) => user_id,
        Err(message) => {
            let event = SessionEvent::error(EventScope::All, message);
            let _ = send_event(&mut sender, &event).await;
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
    };

    let session = match state.creation.enter_session(&user_id, &id).await {
        Ok(session) => session,
        Err(e) => {
            let event = SessionEvent::error(EventScope::All, e.to_string());
            let _ = send_event(&mut sender, &event).await;
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
    };
    info!(user_id = %user_id, "client attached to creation session");

    let mut events = session.attach();
    let mut ping = tokio::time::interval(PING_INTERVAL);
    ping.tick().await;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                let closing = event.event == SessionEventKind::Close;
                if send_event(&mut sender, &event).await.is_err() || closing {
                    break;
                }
            }

            frame = receiver.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        if let Err(event) = handle_frame(&state, &session, &text).await {
                            if send_event(&mut sender, &event).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!(error = %e, "websocket receive error");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }

            _ = ping.tick() => {
                if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
        }
    }

    let _ = sender.send(Message::Close(None)).await;
    debug!("websocket connection closed");
}

/// Wait for the access token frame and verify it.
async fn authenticate(receiver: &mut SplitStream<WebSocket>, state: &AppState) -> Result<String, String> {
    let first = tokio::time::timeout(AUTH_TIMEOUT, async {
        loop {
            match receiver.next().await {
                Some(Ok(Message::Text(text))) => return Some(text.to_string()),
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return None,
                Some(Ok(_)) => {}
            }
        }
    })
    .await
    .map_err(|_| "timed out waiting for access token".to_string())?
    .ok_or_else(|| "connection closed before authentication".to_string())?;

    let token = parse_auth_frame(&first)?;
    state
        .tokens
        .verify(&token)
        .map_err(|e| format!("invalid access token: {e}"))
}

fn parse_auth_frame(text: &str) -> Result<String, String> {
    serde_json::from_str::<AuthFrame>(text)
        .map(|frame| frame.access_token)
        .map_err(|_| "first frame must be {\"access_token\": \"...\"}".to_string())
}

/// Apply one client frame. A failure comes back as an error event.
async fn handle_frame(state: &AppState, session: &Session, text: &str) -> Result<(), SessionEvent> {
    let frame: ClientFrame = serde_json::from_str(text).map_err(|e| {
        warn!(error = %e, "ignoring malformed websocket frame");
        SessionEvent::error(EventScope::All, format!("invalid frame: {e}"))
    })?;

    match frame.event {
        ClientEvent::Chat => {
            let object_type = frame.object_type.object_type().ok_or_else(|| {
                SessionEvent::error(EventScope::All, "chat needs object_type image, character or voice")
            })?;
            session
                .route_user_message(object_type, frame.content)
                .await
                .map_err(|e| SessionEvent::error(object_type, e.to_string()))
        }
        ClientEvent::Confirm => state
            .creation
            .confirm(session)
            .await
            .map(|_| ())
            .map_err(|e| SessionEvent::error(frame.object_type, e.to_string())),
        ClientEvent::Close => {
            state.creation.close(session).await;
            Ok(())
        }
    }
}

async fn send_event(
    sender: &mut (impl SinkExt<Message, Error = axum::Error> + Unpin),
    event: &SessionEvent,
) -> Result<(), axum::Error> {
    match serde_json::to_string(event) {
        Ok(json) => sender.send(Message::Text(json.into())).await,
        Err(e) => {
            warn!(error = %e, "failed to serialize session event");
            Ok(())
        }
    }
}

async fn reject(mut socket: WebSocket, message: String) {
    let event = SessionEvent::error(EventScope::All, message);
    let _ = send_event(&mut socket, &event).await;
    let _ = socket.send(Message::Close(None)).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_frame_parsing() {
        assert_eq!(parse_auth_frame(r#"{"access_token":"u1.abcd"}"#).unwrap(), "u1.abcd");
        assert!(parse_auth_frame(r#"{"token":"u1.abcd"}"#).is_err());
        assert!(parse_auth_frame("u1.abcd").is_err());
    }

    #[test]
    fn client_frames() {
        let frame: ClientFrame =
            serde_json::from_str(r#"{"object_type":"voice","event":"chat","content":"deeper please"}"#).unwrap();
        assert_eq!(frame.object_type, EventScope::Voice);
        assert_eq!(frame.event, ClientEvent::Chat);
        assert_eq!(frame.content, "deeper please");

        let frame: ClientFrame = serde_json::from_str(r#"{"object_type":"all","event":"close"}"#).unwrap();
        assert_eq!(frame.object_type, EventScope::All);
        assert_eq!(frame.event, ClientEvent::Close);
        assert!(frame.content.is_empty());

        assert!(serde_json::from_str::<ClientFrame>(r#"{"object_type":"image","event":"function"}"#).is_err());
    }
}

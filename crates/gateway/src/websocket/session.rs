//! WebSocket session handling: the live channel between one connection
//! and the fan-out router.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use courier_messaging::SyncCursor;
use courier_realtime::{ConnectionId, ServerEvent};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::GatewayError;
use crate::state::GatewayState;

/// Client→server events on the live channel.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    #[serde(rename = "room.join")]
    RoomJoin { thread_id: String },

    #[serde(rename = "room.leave")]
    RoomLeave { thread_id: String },

    #[serde(rename = "typing.signal")]
    Typing { thread_id: String, is_active: bool },

    /// Reconnect handshake: one cursor per thread of interest.
    Sync { threads: Vec<SyncCursor> },

    Ping,
}

#[derive(Debug, Deserialize)]
pub struct WebSocketQuery {
    actor: Option<String>,
}

/// WebSocket connection handler. The participant identity arrives as a
/// query parameter, established upstream like the REST header.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<WebSocketQuery>,
) -> Response {
    let Some(actor) = query.actor.filter(|actor| !actor.is_empty()) else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "error": "AUTHENTICATION_FAILED",
                "message": "missing actor query parameter"
            })),
        )
            .into_response();
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, actor))
}

async fn handle_socket(socket: WebSocket, state: Arc<GatewayState>, actor: String) {
    let (connection_id, mut outbound) = state.router.register(&actor);
    let (mut sink, mut stream) = socket.split();

    debug!(connection_id, actor = %actor, "websocket session opened");

    // Forward router events to the wire. Everything outbound flows
    // through the connection's channel so per-room order is preserved.
    let send_task = tokio::spawn(async move {
        while let Some(event) = outbound.recv().await {
            match serde_json::to_string(&event) {
                Ok(text) => {
                    if sink.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(error) => warn!(%error, "failed to encode server event"),
            }
        }
    });

    // Handle inbound client events until the peer hangs up.
    let recv_state = state.clone();
    let recv_actor = actor.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = stream.next().await {
            match message {
                Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => {
                        handle_client_event(event, &recv_state, &recv_actor, connection_id).await;
                    }
                    Err(error) => {
                        recv_state.router.send_to(
                            connection_id,
                            ServerEvent::Error {
                                code: "INVALID_EVENT".to_string(),
                                message: error.to_string(),
                            },
                        );
                    }
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    // Memberships must be gone before any further broadcast can target
    // this connection.
    state.router.disconnect(connection_id);
    debug!(connection_id, actor = %actor, "websocket session closed");
}

async fn handle_client_event(
    event: ClientEvent,
    state: &Arc<GatewayState>,
    actor: &str,
    connection_id: ConnectionId,
) {
    match event {
        ClientEvent::Ping => {
            state.router.send_to(connection_id, ServerEvent::Pong);
        }

        ClientEvent::RoomJoin { thread_id } => match authorize(state, &thread_id, actor).await {
            Ok(thread) => {
                state.router.join_room(connection_id, thread.id);
                state.router.send_to(
                    connection_id,
                    ServerEvent::RoomJoined {
                        thread_id: thread.public_id,
                    },
                );
            }
            Err(error) => send_error(state, connection_id, &error),
        },

        ClientEvent::RoomLeave { thread_id } => {
            // Leaving is idempotent; an unknown thread is simply a no-op.
            if let Ok(thread) = state.thread_service.get_thread(&thread_id).await {
                state.router.leave_room(connection_id, thread.id);
            }
            state
                .router
                .send_to(connection_id, ServerEvent::RoomLeft { thread_id });
        }

        ClientEvent::Typing {
            thread_id,
            is_active,
        } => match authorize(state, &thread_id, actor).await {
            Ok(thread) => state.typing.set_typing(&thread, actor, is_active),
            Err(error) => send_error(state, connection_id, &error),
        },

        ClientEvent::Sync { threads } => {
            for cursor in threads {
                match state.sync_service.sync_thread(actor, &cursor).await {
                    Ok((thread, batch)) => {
                        // Backfill first, then join for live delivery, so
                        // nothing falls between the batch and the stream.
                        state
                            .router
                            .send_to(connection_id, ServerEvent::SyncBatch { batch });
                        state.router.join_room(connection_id, thread.id);
                        state.router.send_to(
                            connection_id,
                            ServerEvent::RoomJoined {
                                thread_id: thread.public_id,
                            },
                        );
                    }
                    Err(error) => send_error(state, connection_id, &error.into()),
                }
            }
        }
    }
}

async fn authorize(
    state: &Arc<GatewayState>,
    thread_id: &str,
    actor: &str,
) -> Result<courier_database::Thread, GatewayError> {
    let thread = state.thread_service.get_thread(thread_id).await?;
    courier_messaging::ThreadService::require_member(&thread, actor)?;
    Ok(thread)
}

fn send_error(state: &Arc<GatewayState>, connection_id: ConnectionId, error: &GatewayError) {
    state.router.send_to(
        connection_id,
        ServerEvent::Error {
            code: error.code().to_string(),
            message: error.to_string(),
        },
    );
}

//! Message endpoints: send, acknowledge, list.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use courier_database::{Message, MessageKind, NewMessage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::error::{GatewayError, GatewayResult};
use crate::middleware::Actor;
use crate::state::GatewayState;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub id: String,
    pub thread_id: String,
    pub seq: i64,
    pub sender_id: String,
    pub recipient_id: String,
    pub body: String,
    pub kind: String,
    pub attachment_ref: Option<String>,
    pub status: String,
    pub created_at: String,
    pub delivered_at: Option<String>,
    pub read_at: Option<String>,
}

impl From<Message> for MessageResponse {
    fn from(message: Message) -> Self {
        Self {
            id: message.public_id,
            thread_id: message.thread_public_id,
            seq: message.seq,
            sender_id: message.sender_id,
            recipient_id: message.recipient_id,
            body: message.body,
            kind: message.kind.to_string(),
            attachment_ref: message.attachment_ref,
            status: message.status.to_string(),
            created_at: message.created_at,
            delivered_at: message.delivered_at,
            read_at: message.read_at,
        }
    }
}

/// Target is either an existing thread or the peer participant; giving
/// the peer resolves (and lazily creates) the pair thread.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SendMessageRequest {
    pub thread_id: Option<String>,
    pub to: Option<String>,
    pub body: Option<String>,
    pub kind: Option<String>,
    pub attachment_ref: Option<String>,
    pub booking_ref: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListMessagesQuery {
    /// Return messages with seq strictly greater than this; defaults to 0.
    pub since_seq: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MarkReadRequest {
    pub upto_seq: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MarkReadResponse {
    pub read_seqs: Vec<i64>,
    pub unread_count: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Send a message into a thread (or to a participant, resolving the pair
/// thread first). The reply carries the stored message; its status is
/// already `delivered` when the push reached a live recipient connection.
#[utoipa::path(
    post,
    path = "/api/messages",
    request_body = SendMessageRequest,
    responses(
        (status = 200, description = "Message stored", body = MessageResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 403, description = "Not a thread member", body = ErrorResponse),
        (status = 404, description = "Thread not found", body = ErrorResponse),
        (status = 409, description = "Thread is archived", body = ErrorResponse)
    ),
    tag = "messages"
)]
pub async fn send_message(
    State(state): State<Arc<GatewayState>>,
    Actor(actor): Actor,
    Json(request): Json<SendMessageRequest>,
) -> GatewayResult<Json<MessageResponse>> {
    let thread_public_id = match (&request.thread_id, &request.to) {
        (Some(thread_id), _) => thread_id.clone(),
        (None, Some(peer)) => {
            state
                .thread_service
                .resolve_thread(&actor, peer, request.booking_ref.as_deref())
                .await?
                .public_id
        }
        (None, None) => {
            return Err(GatewayError::InvalidRequest(
                "either thread_id or to is required".to_string(),
            ))
        }
    };

    let content = NewMessage {
        body: request.body.unwrap_or_default(),
        kind: request
            .kind
            .as_deref()
            .map(MessageKind::from)
            .unwrap_or(MessageKind::Text),
        attachment_ref: request.attachment_ref,
    };

    let message = state
        .message_service
        .append(&thread_public_id, &actor, &content)
        .await?;

    Ok(Json(message.into()))
}

/// List a thread's messages in ascending sequence order.
#[utoipa::path(
    get,
    path = "/api/threads/{thread_id}/messages",
    params(
        ("thread_id" = String, Path, description = "Thread public id"),
        ListMessagesQuery
    ),
    responses(
        (status = 200, description = "Messages in seq order", body = [MessageResponse]),
        (status = 403, description = "Not a thread member", body = ErrorResponse),
        (status = 404, description = "Thread not found", body = ErrorResponse)
    ),
    tag = "messages"
)]
pub async fn list_messages(
    State(state): State<Arc<GatewayState>>,
    Actor(actor): Actor,
    Path(thread_id): Path<String>,
    Query(query): Query<ListMessagesQuery>,
) -> GatewayResult<Json<Vec<MessageResponse>>> {
    let messages = state
        .message_service
        .list_since(
            &thread_id,
            &actor,
            query.since_seq.unwrap_or(0),
            query.limit,
        )
        .await?;

    Ok(Json(messages.into_iter().map(Into::into).collect()))
}

/// Explicit delivery acknowledgement from the recipient's client.
#[utoipa::path(
    post,
    path = "/api/messages/{message_id}/delivered",
    params(("message_id" = String, Path, description = "Message public id")),
    responses(
        (status = 200, description = "Current message state", body = MessageResponse),
        (status = 403, description = "Caller is not the recipient", body = ErrorResponse),
        (status = 404, description = "Message not found", body = ErrorResponse)
    ),
    tag = "messages"
)]
pub async fn ack_delivered(
    State(state): State<Arc<GatewayState>>,
    Actor(actor): Actor,
    Path(message_id): Path<String>,
) -> GatewayResult<Json<MessageResponse>> {
    // A no-op transition still returns the current state: the ack is
    // idempotent for clients retrying after a flaky connection.
    match state.message_service.ack_delivered(&message_id, &actor).await? {
        Some(message) => Ok(Json(message.into())),
        None => {
            let message = state
                .message_service
                .get_message(&message_id, &actor)
                .await?;
            Ok(Json(message.into()))
        }
    }
}

/// Mark everything addressed to the caller as read, up to a sequence
/// number (typically issued when the client focuses the thread).
#[utoipa::path(
    post,
    path = "/api/threads/{thread_id}/read",
    params(("thread_id" = String, Path, description = "Thread public id")),
    request_body = MarkReadRequest,
    responses(
        (status = 200, description = "Read outcome", body = MarkReadResponse),
        (status = 403, description = "Not a thread member", body = ErrorResponse),
        (status = 404, description = "Thread not found", body = ErrorResponse)
    ),
    tag = "messages"
)]
pub async fn mark_read(
    State(state): State<Arc<GatewayState>>,
    Actor(actor): Actor,
    Path(thread_id): Path<String>,
    Json(request): Json<MarkReadRequest>,
) -> GatewayResult<Json<MarkReadResponse>> {
    let outcome = state
        .message_service
        .mark_thread_read(&thread_id, &actor, request.upto_seq)
        .await?;

    Ok(Json(MarkReadResponse {
        read_seqs: outcome.updated.iter().map(|m| m.seq).collect(),
        unread_count: outcome.unread_count,
    }))
}

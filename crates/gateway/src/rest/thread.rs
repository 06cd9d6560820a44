//! Conversation-list endpoint.

use axum::{extract::State, Json};
use courier_database::ThreadSummary;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::GatewayResult;
use crate::middleware::Actor;
use crate::rest::message::MessageResponse;
use crate::state::GatewayState;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConversationResponse {
    pub thread_id: String,
    pub other_participant: String,
    pub booking_ref: Option<String>,
    pub archived: bool,
    pub last_message: Option<MessageResponse>,
    pub unread_count: i64,
    pub last_activity_at: String,
}

impl From<ThreadSummary> for ConversationResponse {
    fn from(summary: ThreadSummary) -> Self {
        Self {
            thread_id: summary.thread_id,
            other_participant: summary.other_participant,
            booking_ref: summary.booking_ref,
            archived: summary.archived,
            last_message: summary.last_message.map(Into::into),
            unread_count: summary.unread_count,
            last_activity_at: summary.last_activity_at,
        }
    }
}

/// The caller's conversations, most recent activity first.
#[utoipa::path(
    get,
    path = "/api/conversations",
    responses(
        (status = 200, description = "Conversation list", body = [ConversationResponse]),
        (status = 401, description = "Missing actor identity")
    ),
    tag = "conversations"
)]
pub async fn list_conversations(
    State(state): State<Arc<GatewayState>>,
    Actor(actor): Actor,
) -> GatewayResult<Json<Vec<ConversationResponse>>> {
    let summaries = state.message_service.list_threads(&actor).await?;
    Ok(Json(summaries.into_iter().map(Into::into).collect()))
}

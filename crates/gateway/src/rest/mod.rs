//! REST API routes

pub mod health;
pub mod message;
pub mod thread;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::state::GatewayState;

/// Create all REST routes
pub fn create_rest_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/conversations", get(thread::list_conversations))
        .route("/api/messages", post(message::send_message))
        .route(
            "/api/messages/:message_id/delivered",
            post(message::ack_delivered),
        )
        .route(
            "/api/threads/:thread_id/messages",
            get(message::list_messages),
        )
        .route("/api/threads/:thread_id/read", post(message::mark_read))
}

//! WebSocket routes

pub mod session;

use axum::{routing::get, Router};
use std::sync::Arc;

use crate::state::GatewayState;

pub use session::ClientEvent;

/// Create WebSocket routes
pub fn create_websocket_routes() -> Router<Arc<GatewayState>> {
    Router::new().route("/ws", get(session::websocket_handler))
}

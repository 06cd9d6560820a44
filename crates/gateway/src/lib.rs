//! # Courier Gateway Crate
//!
//! HTTP surface of the messaging core: REST endpoints for durable
//! operations and the WebSocket live channel, both routed to the domain
//! services in `courier-messaging` and the fan-out layer in
//! `courier-realtime`.
//!
//! ## Architecture
//!
//! - **REST**: send/list/ack endpoints with OpenAPI documentation
//! - **WebSocket**: room membership, typing, reconnect sync, live events
//! - **State**: shared service handles plus the room router
//! - **Middleware**: actor identity extraction and request logging

pub mod error;
pub mod middleware;
pub mod rest;
pub mod state;
pub mod websocket;

// Re-export main types for convenience
pub use error::{GatewayError, GatewayResult};
pub use state::GatewayState;

// Legacy-style alias kept for the binary crate
pub use create_router as build_router;

use axum::{http::Method, middleware as axum_middleware, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Create the main application router with all routes
pub fn create_router(state: GatewayState) -> Router {
    let arc_state = Arc::new(state);
    let mut router = Router::new()
        // REST API routes
        .merge(rest::create_rest_routes().with_state(arc_state.clone()))
        // WebSocket routes
        .merge(websocket::create_websocket_routes().with_state(arc_state))
        // CORS middleware
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers(Any),
        )
        // Logging middleware
        .layer(axum_middleware::from_fn(middleware::logging_middleware));

    // Add Swagger UI in debug mode
    #[cfg(debug_assertions)]
    {
        #[derive(OpenApi)]
        #[openapi(
            paths(
                rest::health::health_check,
                rest::thread::list_conversations,
                rest::message::send_message,
                rest::message::list_messages,
                rest::message::ack_delivered,
                rest::message::mark_read,
            ),
            components(
                schemas(
                    rest::health::HealthResponse,
                    rest::thread::ConversationResponse,
                    rest::message::MessageResponse,
                    rest::message::SendMessageRequest,
                    rest::message::MarkReadRequest,
                    rest::message::MarkReadResponse,
                    rest::message::ErrorResponse,
                )
            ),
            tags(
                (name = "health", description = "Service health"),
                (name = "conversations", description = "Conversation list"),
                (name = "messages", description = "Message send, list and acknowledgements"),
            )
        )]
        struct ApiDoc;

        router = router
            .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));
    }

    router
}

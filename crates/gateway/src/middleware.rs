//! Request middleware and the actor identity extractor.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::info;

use crate::error::GatewayError;

/// Opaque participant identity established by the upstream auth
/// collaborator and forwarded on every request. The core never issues or
/// verifies sessions itself.
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Extractor for the calling participant.
pub struct Actor(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(|value| Actor(value.to_string()))
            .ok_or_else(|| {
                GatewayError::AuthenticationFailed(format!("missing {ACTOR_HEADER} header"))
            })
    }
}

/// Log each request with its outcome and latency.
pub async fn logging_middleware(request: Request<axum::body::Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let started = Instant::now();

    let response = next.run(request).await;

    info!(
        %method,
        %uri,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "handled request"
    );

    response
}

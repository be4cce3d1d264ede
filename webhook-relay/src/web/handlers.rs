//! Route handlers.
//!
//! The POST handler only reads the body, answers `EVENT_RECEIVED` and hands
//! the payload to the forwarder. The upstream round trip never delays the
//! dispatcher.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    body::{Body, Bytes},
    extract::{Query, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::Stream;
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::forward::Forwarder;
use crate::web::verify::VerificationChallenge;
use crate::Config;

/// Body sent to the dispatcher for every accepted event.
pub const EVENT_RECEIVED: &str = "EVENT_RECEIVED";

/// Name reported by the health endpoint.
pub const SERVICE_NAME: &str = "webhook-relay";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub forwarder: Forwarder,
}

impl AppState {
    pub fn new(config: Config, forwarder: Forwarder) -> Self {
        Self {
            config: Arc::new(config),
            forwarder,
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
}

/// Health check endpoint. The relay has no dependencies to probe.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: SERVICE_NAME,
    })
}

// =============================================================================
// Verification Handshake
// =============================================================================

/// Webhook verification endpoint.
///
/// A query string that fails to deserialize is handled like one with
/// missing parameters.
pub async fn verify_webhook(
    State(state): State<AppState>,
    query: Option<Query<VerificationChallenge>>,
) -> Response {
    let challenge = query.map(|Query(c)| c).unwrap_or_default();
    let mode = challenge.mode.clone();

    match challenge.verify(&state.config.verify_token) {
        Some(echo) => {
            info!(challenge_length = echo.len(), "webhook_verified");
            (StatusCode::OK, echo).into_response()
        }
        None => {
            warn!(mode = ?mode, "webhook_verification_failed");
            (StatusCode::FORBIDDEN, "Forbidden").into_response()
        }
    }
}

// =============================================================================
// Event Delivery
// =============================================================================

/// Event delivery endpoint.
///
/// Responds once the body has been read; the forward starts after the
/// acknowledgment body has been handed off and dropped by the server.
pub async fn receive_event(State(state): State<AppState>, body: Bytes) -> Response {
    info!(
        body_length = body.len(),
        in_flight = state.forwarder.in_flight(),
        "event_received"
    );

    let (ack, acked) = oneshot::channel();
    state.forwarder.spawn_after(body, acked);

    (
        StatusCode::OK,
        [(CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(AckBody::new(ack)),
    )
        .into_response()
}

/// Single-chunk `EVENT_RECEIVED` body holding the acknowledgment signal.
///
/// Dropping it, after the chunk has been written or when the connection
/// goes away, releases the pending forward.
struct AckBody {
    chunk: Option<Bytes>,
    _ack: oneshot::Sender<()>,
}

impl AckBody {
    fn new(ack: oneshot::Sender<()>) -> Self {
        Self {
            chunk: Some(Bytes::from_static(EVENT_RECEIVED.as_bytes())),
            _ack: ack,
        }
    }
}

impl Stream for AckBody {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(self.chunk.take().map(Ok))
    }
}

// =============================================================================
// Fallback
// =============================================================================

/// Everything else, including other methods on known paths.
pub async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not found")
}

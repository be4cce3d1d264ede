//! Web server module for the relay listener.
//!
//! This module provides a thin, fast web server that:
//! - Answers the platform's verification handshake
//! - Acknowledges event deliveries immediately
//! - Forwards each event upstream in the background
//! - Reports liveness on `/health`
//!
//! Anything else gets `404 Not found`.

pub mod handlers;
pub mod verify;

use axum::{extract::DefaultBodyLimit, routing::get, Router};
use tower_http::trace::TraceLayer;

pub use handlers::{
    health, not_found, receive_event, verify_webhook, AppState, HealthResponse, EVENT_RECEIVED,
    SERVICE_NAME,
};
pub use verify::{VerificationChallenge, SUBSCRIBE_MODE};

/// Build the listener's router.
pub fn router(state: AppState) -> Router {
    let webhook_path = state.config.webhook_path.clone();
    let max_body_bytes = state.config.max_body_bytes;

    Router::new()
        .route("/health", get(health).head(not_found).fallback(not_found))
        .route(
            &webhook_path,
            get(verify_webhook)
                .head(not_found)
                .post(receive_event)
                .fallback(not_found),
        )
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

//! Best-effort forwarding of event payloads to the upstream API.
//!
//! Each accepted event is re-posted exactly once, byte-for-byte, on a task
//! that outlives the inbound request. Results are logged and dropped: there
//! is no retry and nothing is reported back to the dispatcher.

use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{HeaderName, HeaderValue};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tokio::sync::oneshot;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};
use url::Url;

use crate::Config;

/// Errors raised while building the forwarder or sending one event.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("application credential is not a valid header value")]
    InvalidCredential(#[from] axum::http::header::InvalidHeaderValue),

    #[error("upstream request failed: {0}")]
    Transport(#[source] reqwest::Error),
}

/// What the upstream answered for one forwarded event.
#[derive(Debug, Clone)]
pub struct ForwardOutcome {
    pub status: StatusCode,
    /// Lossy UTF-8 rendering of the first bytes of the response body
    pub body_prefix: String,
}

impl ForwardOutcome {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Upstream client shared by all request handlers.
///
/// Cloning is cheap; every clone spawns onto the same task tracker so that
/// [`Forwarder::drain`] sees all in-flight forwards.
#[derive(Clone)]
pub struct Forwarder {
    inner: Arc<ForwarderInner>,
}

struct ForwarderInner {
    client: Client,
    url: Url,
    app_id_header: HeaderName,
    app_id: HeaderValue,
    diagnostic_prefix_bytes: usize,
    tracker: TaskTracker,
}

impl Forwarder {
    /// Create a forwarder targeting the configured upstream.
    pub fn new(config: &Config) -> Result<Self, ForwardError> {
        let client = Client::builder().build().map_err(ForwardError::Client)?;

        let mut app_id = HeaderValue::from_str(&config.app_id)?;
        app_id.set_sensitive(true);

        Ok(Self {
            inner: Arc::new(ForwarderInner {
                client,
                url: config.upstream_url.clone(),
                app_id_header: config.app_id_header.clone(),
                app_id,
                diagnostic_prefix_bytes: config.diagnostic_prefix_bytes,
                tracker: TaskTracker::new(),
            }),
        })
    }

    /// Forward one payload and wait for the upstream status.
    ///
    /// A non-2xx status is still `Ok`; only transport failures are errors.
    /// A response body that breaks off early keeps the status and whatever
    /// prefix arrived.
    pub async fn forward(&self, body: Bytes) -> Result<ForwardOutcome, ForwardError> {
        let inner = &self.inner;
        let body_length = body.len();

        let mut resp = inner
            .client
            .post(inner.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(CONTENT_LENGTH, body_length)
            .header(inner.app_id_header.clone(), inner.app_id.clone())
            .body(body)
            .send()
            .await
            .map_err(ForwardError::Transport)?;

        let status = resp.status();
        let limit = inner.diagnostic_prefix_bytes;
        let mut prefix = Vec::with_capacity(limit.min(1024));

        while prefix.len() < limit {
            match resp.chunk().await {
                Ok(Some(chunk)) => {
                    let take = (limit - prefix.len()).min(chunk.len());
                    prefix.extend_from_slice(&chunk[..take]);
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(
                        status_code = status.as_u16(),
                        error = %e,
                        "forward_response_read_failed"
                    );
                    break;
                }
            }
        }

        Ok(ForwardOutcome {
            status,
            body_prefix: String::from_utf8_lossy(&prefix).into_owned(),
        })
    }

    /// Forward in the background once `acked` resolves.
    ///
    /// The receiver also completes when its sender is dropped. The task is
    /// tracked for [`Forwarder::drain`] but never awaited by the caller.
    pub fn spawn_after(&self, body: Bytes, acked: oneshot::Receiver<()>) {
        let forwarder = self.clone();
        self.inner.tracker.spawn(async move {
            let _ = acked.await;
            forwarder.forward_and_log(body).await;
        });
    }

    async fn forward_and_log(&self, body: Bytes) {
        let body_length = body.len();

        match self.forward(body).await {
            Ok(outcome) if outcome.is_success() => {
                info!(
                    body_length = body_length,
                    status_code = outcome.status.as_u16(),
                    response_prefix = %outcome.body_prefix,
                    "forward_complete"
                );
            }
            Ok(outcome) => {
                warn!(
                    body_length = body_length,
                    status_code = outcome.status.as_u16(),
                    response_prefix = %outcome.body_prefix,
                    "forward_upstream_error"
                );
            }
            Err(e) => {
                if let ForwardError::Transport(source) = &e {
                    if source.is_connect() {
                        error!(body_length = body_length, error = %e, "forward_connect_failed");
                        return;
                    }
                }
                error!(body_length = body_length, error = %e, "forward_failed");
            }
        }
    }

    /// Number of forwards still running.
    pub fn in_flight(&self) -> usize {
        self.inner.tracker.len()
    }

    /// Stop accepting new forwards and wait for the running ones to finish.
    pub async fn drain(&self) {
        self.inner.tracker.close();
        info!(in_flight = self.in_flight(), "forward_drain_started");
        self.inner.tracker.wait().await;
        info!("forward_drain_complete");
    }
}

//! Configuration module for environment variable parsing.
//!
//! Everything the relay needs is read once at startup and never changes
//! afterwards. Secrets and the upstream location are required: a relay that
//! would reject every handshake or fail every forward refuses to start.

use std::env;

use axum::http::HeaderName;
use thiserror::Error;
use tracing::warn;
use url::Url;

/// Default path the platform dispatcher is registered against.
pub const DEFAULT_WEBHOOK_PATH: &str = "/facebook/webhook";

/// Default name of the application-identity header sent upstream.
pub const DEFAULT_APP_ID_HEADER: &str = "X-Parse-Application-Id";

/// Errors that prevent the relay from starting.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is missing or blank")]
    Missing(&'static str),

    #[error("environment variable {name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the listener to bind on all interfaces
    pub port: u16,

    /// Shared secret expected in `hub.verify_token`
    pub verify_token: String,

    /// Path serving both the handshake (GET) and event delivery (POST)
    pub webhook_path: String,

    /// Full URL events are forwarded to
    pub upstream_url: Url,

    /// Header carrying the application credential upstream
    pub app_id_header: HeaderName,

    /// Application credential value
    pub app_id: String,

    /// Largest inbound body accepted, in bytes
    pub max_body_bytes: usize,

    /// How much of the upstream response body is logged
    pub diagnostic_prefix_bytes: usize,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let verify_token = required(&lookup, "VERIFY_TOKEN")?;
        let upstream_host = required(&lookup, "UPSTREAM_HOST")?;
        let upstream_path = required(&lookup, "UPSTREAM_PATH")?;
        let app_id = required(&lookup, "UPSTREAM_APP_ID")?;

        let scheme = lookup("UPSTREAM_SCHEME")
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "https".to_string());

        if !upstream_path.starts_with('/') {
            return Err(ConfigError::Invalid {
                name: "UPSTREAM_PATH",
                reason: "must start with '/'".to_string(),
            });
        }

        let upstream_url = Url::parse(&format!("{}://{}{}", scheme, upstream_host, upstream_path))
            .map_err(|e| ConfigError::Invalid {
                name: "UPSTREAM_HOST",
                reason: e.to_string(),
            })?;

        let app_id_header = lookup("UPSTREAM_APP_ID_HEADER")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_APP_ID_HEADER.to_string());
        let app_id_header =
            HeaderName::from_bytes(app_id_header.as_bytes()).map_err(|e| ConfigError::Invalid {
                name: "UPSTREAM_APP_ID_HEADER",
                reason: e.to_string(),
            })?;

        let webhook_path = lookup("WEBHOOK_PATH")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_WEBHOOK_PATH.to_string());

        if !webhook_path.starts_with('/') || webhook_path == "/health" {
            return Err(ConfigError::Invalid {
                name: "WEBHOOK_PATH",
                reason: "must start with '/' and differ from /health".to_string(),
            });
        }

        // Route syntax characters would turn the path into a capture or wildcard.
        if webhook_path.contains([':', '*', '{', '}']) {
            return Err(ConfigError::Invalid {
                name: "WEBHOOK_PATH",
                reason: "must not contain ':', '*', '{' or '}'".to_string(),
            });
        }

        Ok(Config {
            port: parse_or(&lookup, "PORT", 3000)?,
            verify_token,
            webhook_path,
            upstream_url,
            app_id_header,
            app_id,
            max_body_bytes: parse_or(&lookup, "MAX_BODY_BYTES", 10 * 1024 * 1024)?,
            diagnostic_prefix_bytes: parse_or(&lookup, "DIAGNOSTIC_PREFIX_BYTES", 200)?,
        })
    }
}

/// Fetch a variable that must be present and non-blank.
fn required<F>(lookup: &F, name: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

/// Parse an optional numeric variable. Absent means default, garbage is fatal.
fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = match lookup(name) {
        Some(v) if !v.trim().is_empty() => v,
        _ => return Ok(default),
    };

    raw.trim().parse().map_err(|e: T::Err| {
        warn!(env_var = name, value = %raw, "invalid_numeric_value");
        ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }
    })
}

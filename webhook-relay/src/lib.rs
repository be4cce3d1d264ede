//! Webhook relay between a messaging platform's dispatcher and a
//! backend-as-a-service API.
//!
//! The dispatcher only delivers to a fixed public endpoint. The relay answers
//! its verification handshake, acknowledges every event at once and forwards
//! the raw payload to the upstream with the application credential attached.
//!
//! ## Flow
//!
//! ```text
//! Dispatcher → POST /facebook/webhook → 200 EVENT_RECEIVED
//!                                     ↘ background task → POST upstream
//! ```

pub mod config;
pub mod forward;
pub mod web;

// Re-export commonly used types
pub use config::{Config, ConfigError};
pub use forward::{ForwardError, ForwardOutcome, Forwarder};
pub use web::{router, AppState};

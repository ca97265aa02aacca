#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Access to the SRA data share API.
//!
//! [`client::RegistryClient`] issues authenticated requests through a
//! [`rate_limit::RateLimiter`] and a pluggable [`transport::Transport`],
//! retrying transient failures with exponential backoff.

pub mod client;
pub mod progress;
pub mod rate_limit;
pub mod transport;

use uk_solicitors_config::ConfigError;

/// Errors that can occur while talking to the registry API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// HTTP request failed at the network level.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Transport-level failure reported without a `reqwest` error.
    #[error("Transport error: {message}")]
    Transport {
        /// Description of what went wrong.
        message: String,
    },

    /// The server kept answering 429 until the retry budget ran out.
    #[error("Rate limited by server after {attempts} attempts")]
    RateLimited {
        /// Number of physical requests made.
        attempts: u32,
    },

    /// HTTP 401.
    #[error("Invalid API key or authentication failed")]
    Auth,

    /// HTTP 403.
    #[error("Access forbidden - check API key permissions")]
    Forbidden,

    /// Any other non-success status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// Response status code.
        status: u16,
        /// Leading part of the response body.
        body: String,
    },

    /// Response body does not have the expected shape.
    #[error("Unexpected response shape: {message}")]
    Shape {
        /// Description of what is missing or malformed.
        message: String,
    },

    /// JSON (de)serialization failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Client settings are incomplete.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ApiError {
    /// Returns `true` if the failure is worth retrying with backoff.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => {
                e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() || e.is_status()
            }
            Self::Transport { .. } | Self::Status { .. } => true,
            Self::RateLimited { .. }
            | Self::Auth
            | Self::Forbidden
            | Self::Shape { .. }
            | Self::Json(_)
            | Self::Config(_) => false,
        }
    }
}

//! Error types for the cloud client

use thiserror::Error;

/// Result type for cloud operations
pub type CloudResult<T> = Result<T, CloudError>;

/// Errors returned by the cloud client
///
/// Response bodies are never carried: they hold account data.
#[derive(Debug, Error)]
pub enum CloudError {
    #[error("missing cloud setting: {0}")]
    MissingSetting(&'static str),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("authentication rejected (status {status})")]
    AuthenticationFailed { status: u16 },

    #[error("invalid response (status {status})")]
    InvalidResponse { status: u16 },

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

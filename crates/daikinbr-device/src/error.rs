//! Error types for the device client

use thiserror::Error;

/// Result type for device operations
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Errors returned by a unit or while talking to it
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("invalid secret key: {0}")]
    InvalidSecretKey(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid request URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("unit answered with status {status}")]
    Status { status: u16 },

    #[error("payload could not be decrypted")]
    Decrypt,

    #[error("payload could not be encrypted")]
    Encrypt,

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("unknown {field} code {code}")]
    UnknownCode { field: &'static str, code: u8 },
}

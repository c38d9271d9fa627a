//! Startup errors

use daikinbr_cloud::CloudError;
use daikinbr_config::ConfigError;
use thiserror::Error;

/// Result type for bridge startup
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors that stop the bridge from starting
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to refresh devices from the cloud: {0}")]
    Cloud(#[from] CloudError),
}

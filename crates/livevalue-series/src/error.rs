//! Error types for livevalue-series

use thiserror::Error;

/// Series error type
#[derive(Debug, Error)]
pub enum Error {
    /// The name does not lie in the hub namespace
    #[error("Illegal hub name: {0}")]
    IllegalHubName(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for series operations
pub type Result<T> = std::result::Result<T, Error>;

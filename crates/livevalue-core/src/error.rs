//! Error types for livevalue-core

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Illegal hub name: {0}")]
    IllegalHubName(String),

    #[error("Illegal leaf name: {0}")]
    IllegalLeafName(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

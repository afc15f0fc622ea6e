//! Error types for livevalue-hub

use thiserror::Error;

/// Result type for livevalue-hub operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in livevalue-hub
///
/// Only structural problems surface here. Data-level anomalies on the write
/// path (unknown predicates, duplicate registrations, history IO) are logged
/// and recovered locally.
#[derive(Debug, Error)]
pub enum Error {
    /// No hub is registered under this name
    #[error("unknown hub: {0}")]
    UnknownHub(String),

    /// Configuration could not be parsed
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Core error
    #[error("core error: {0}")]
    Core(#[from] livevalue_core::Error),
}

// Compile-time check that Error is Send + Sync for thread-safe error propagation.
fn _assert_error_send_sync<T: Send + Sync>() {}
fn _error_is_send_sync() {
    _assert_error_send_sync::<Error>();
}

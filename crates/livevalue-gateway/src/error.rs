//! Error types for livevalue-gateway

use thiserror::Error;

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Usage errors reported back to the caller of a request
#[derive(Debug, Error)]
pub enum Error {
    #[error("Illegal path format: {0}")]
    IllegalPath(String),

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Undefined selector: {0}")]
    UndefinedSelector(String),

    #[error("Specify a id: {0}")]
    MissingId(String),

    #[error("Unknown id: {0}")]
    UnknownId(String),

    #[error("No path specified")]
    NoPathSpecified,

    #[error("Illegal character in path element: {0}")]
    IllegalTag(String),

    #[error("No path found")]
    NoPathFound,

    #[error("Too many path elements: {0}")]
    TooManyPathElements(String),

    #[error("No query parm")]
    MissingQuery,

    #[error("Duplicate query parms")]
    DuplicateQuery,

    #[error("Multiple result elements: {0} columns")]
    MultipleColumns(usize),

    #[error("Invalid parameter {name}: {value}")]
    InvalidParam { name: String, value: String },

    #[error("hub error: {0}")]
    Hub(#[from] livevalue_hub::Error),
}

// Compile-time check that Error is Send + Sync for thread-safe error propagation.
fn _assert_error_send_sync<T: Send + Sync>() {}
fn _error_is_send_sync() {
    _assert_error_send_sync::<Error>();
}

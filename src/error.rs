//! Error types for the bridge layer.
//!
//! Every public operation fails with exactly one of these kinds; driver-level
//! faults are wrapped, never swallowed.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Connection failure: {0}")]
    Connection(String),

    #[error("Remote execution error: {0}")]
    Execution(String),

    #[error("Query timeout: {0}")]
    Timeout(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Malformed value: {0}")]
    MalformedValue(String),

    #[error("Handle space exhausted")]
    RegistryExhausted,

    #[error("Unsupported by driver: {0}")]
    Unsupported(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;

//! Error types for the Nutanix API clients

use thiserror::Error;

/// Result type alias using the client Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while talking to Nutanix APIs
#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{detail}")]
    TaskFailed { id: String, detail: String },

    #[error("unexpected state '{state}', wanted target '{target}'")]
    UnexpectedState { state: String, target: String },

    #[error("timeout while waiting for {id} after {seconds}s")]
    Timeout { id: String, seconds: u64 },

    #[error("operation cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when the remote entity no longer exists.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Api { status, message } => {
                *status == 404 || message.contains("ENTITY_NOT_FOUND")
            }
            _ => false,
        }
    }
}

//! Error types for the sync system
//!
//! Two tiers exist. [`RequestError`] is anything a node's control API did to
//! us (bad status, unreachable host, unreadable body) and is recovered per
//! node by the orchestrator. Every other [`Error`] variant is fatal to a run.

use thiserror::Error;

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failure talking to a single node's control API
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// The node answered with a non-2xx HTTP status
    #[error("HTTP {0}")]
    Status(u16),

    /// Connection-level failure, malformed URL or undecodable response body
    #[error("transport failure: {0}")]
    Transport(String),
}

impl RequestError {
    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// HTTP status code, if the node produced one
    pub fn status(&self) -> Option<u16> {
        match self {
            RequestError::Status(code) => Some(*code),
            RequestError::Transport(_) => None,
        }
    }
}

/// Core error type for the sync system
#[derive(Error, Debug)]
pub enum Error {
    /// A node's control API failed
    #[error("Request failed: {0}")]
    Request(#[from] RequestError),

    /// Node registry / record store errors
    #[error("Registry error: {0}")]
    Registry(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a request error carrying an HTTP status
    pub fn status(code: u16) -> Self {
        Self::Request(RequestError::Status(code))
    }

    /// Create a request error for a transport failure
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Request(RequestError::transport(msg))
    }

    /// Create a registry error
    pub fn registry(msg: impl Into<String>) -> Self {
        Self::Registry(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// The node-level failure inside this error, if it is one
    pub fn as_request(&self) -> Option<&RequestError> {
        match self {
            Error::Request(e) => Some(e),
            _ => None,
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

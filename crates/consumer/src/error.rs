//! Consumer error types.

use service::ServiceError;
use thiserror::Error;

/// Errors that can occur while consuming inbound messages.
#[derive(Debug, Error)]
pub enum ConsumerError {
    /// The inbound payload was not valid JSON for its channel.
    #[error("Malformed message: {0}")]
    Parse(#[from] serde_json::Error),

    /// The message bus rejected the translated command.
    #[error("Handling failed: {0}")]
    Service(#[from] ServiceError),

    /// Reading the inbound stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The metrics recorder could not be installed.
    #[error("Metrics error: {0}")]
    Metrics(String),
}

/// Convenience type alias for consumer results.
pub type Result<T> = std::result::Result<T, ConsumerError>;

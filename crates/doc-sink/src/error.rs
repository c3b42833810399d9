//! Error types for doc-sink crate.

use thiserror::Error;

/// Errors raised while opening a sink.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Cannot open '{destination}' for appending: {source}")]
    Unavailable {
        destination: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported destination '{destination}': {reason}")]
    Unsupported { destination: String, reason: String },
}

impl SinkError {
    /// The destination that could not be opened.
    pub fn destination(&self) -> &str {
        match self {
            SinkError::Unavailable { destination, .. } => destination,
            SinkError::Unsupported { destination, .. } => destination,
        }
    }
}

/// Result type alias for doc-sink operations.
pub type Result<T> = std::result::Result<T, SinkError>;

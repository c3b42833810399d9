//! Error types for doc manager operations.

use doc_sink::SinkError;
use doc_types::DocTypesError;
use thiserror::Error;

/// Errors returned by [`DocManager`](crate::DocManager) operations.
///
/// None of these are retried by the doc manager; each is surfaced to the
/// caller of the operation that hit it.
#[derive(Error, Debug)]
pub enum DocManagerError {
    /// The destination could not be opened for appending.
    #[error("Sink unavailable for destination '{destination}': {source}")]
    SinkUnavailable {
        destination: String,
        #[source]
        source: SinkError,
    },

    /// A removal was requested for a document without the unique key field.
    #[error("Document is missing unique key field '{key}'")]
    MissingKey { key: String },

    /// The document could not be encoded; nothing was written.
    #[error("Failed to serialize document: {0}")]
    SerializationFailure(#[source] DocTypesError),

    /// The sink rejected a write or flush.
    #[error("Failed to write to sink: {0}")]
    WriteFailure(#[source] std::io::Error),

    /// The sink could not be read back for a query.
    #[error("Failed to read sink for query: {0}")]
    ReadFailure(#[source] std::io::Error),

    /// A line read back from the sink is not a valid record.
    #[error("Corrupt sink record at line {line}: {reason}")]
    CorruptRecord { line: usize, reason: String },

    /// The configuration cannot be used to build a doc manager.
    #[error("Invalid doc manager configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for doc manager operations.
pub type Result<T> = std::result::Result<T, DocManagerError>;

//! Error types for doc-types crate.

use thiserror::Error;

/// Errors that can occur while encoding or decoding sink records.
#[derive(Error, Debug)]
pub enum DocTypesError {
    #[error("JSON encoding error: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Extended JSON decoding error: {0}")]
    ExtJson(#[from] bson::extjson::de::Error),

    #[error("Expected a JSON object, got {actual}")]
    NotADocument { actual: String },

    #[error("Malformed {kind} record: {reason}")]
    MalformedRecord { kind: &'static str, reason: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Document does not survive a sink round trip: {reason}")]
    Unrepresentable { reason: String },

    #[error("BSON encoding error: {0}")]
    Bson(#[from] bson::ser::Error),
}

/// Result type alias for doc-types operations.
pub type Result<T> = std::result::Result<T, DocTypesError>;

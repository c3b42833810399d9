//! Canonical extended JSON encoding of BSON documents.

use bson::{Bson, Document};

use crate::error::{DocTypesError, Result};

/// Encode a document as a single line of canonical extended JSON.
///
/// Canonical mode keeps the exact BSON type of every value, e.g. an `Int32`
/// becomes `{"$numberInt": "1"}` rather than a bare number, so decoding yields
/// the same document back. The returned string contains no newline.
pub fn encode_document(doc: &Document) -> Result<String> {
    let value = Bson::Document(doc.clone()).into_canonical_extjson();
    serde_json::to_string(&value).map_err(DocTypesError::Encode)
}

/// Decode a line of extended JSON (canonical or relaxed) into a document.
pub fn decode_document(line: &str) -> Result<Document> {
    let value: serde_json::Value = serde_json::from_str(line)?;
    value_to_document(value)
}

/// Convert an already-parsed JSON value into a document.
pub fn value_to_document(value: serde_json::Value) -> Result<Document> {
    if !value.is_object() {
        return Err(DocTypesError::NotADocument {
            actual: json_kind(&value).to_string(),
        });
    }

    match Bson::try_from(value)? {
        Bson::Document(doc) => Ok(doc),
        // An object made of a single extended-JSON key such as `{"$oid": ...}`
        // parses as a scalar.
        other => Err(DocTypesError::NotADocument {
            actual: format!("{:?}", other.element_type()),
        }),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

//! Line framing for everything a doc manager writes to its sink.
//!
//! A sink holds one JSON object per line:
//!
//! - a document: the canonical extended JSON of the document itself
//! - a removal tombstone: `{"$remove": {"<unique key>": "<id>"}}`
//! - a time-range query: `{"$query": {"_ts": {"$gte": <start>, "$lte": <end>}}}`
//!
//! Field names starting with `$` are legal in stored documents, and canonical
//! extended JSON does not escape them. A document whose encoding would read
//! back as something else (a tombstone, a query, or a different BSON value)
//! is rejected by [`document_line`] instead of being written.

use bson::Document;
use serde_json::{json, Map, Value};

use crate::codec::{encode_document, value_to_document};
use crate::error::{DocTypesError, Result};
use crate::key::TIMESTAMP_FIELD;

const REMOVE_TAG: &str = "$remove";
const QUERY_TAG: &str = "$query";

/// A single fact appended to a sink.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkRecord {
    /// Latest version of a document.
    Upsert(Document),
    /// The document whose unique key `key` has string form `id` was removed.
    Remove { key: String, id: String },
    /// A closed `_ts` range query was issued.
    Query { start_ts: i64, end_ts: i64 },
}

impl SinkRecord {
    /// Render the record as a single line without the trailing newline.
    pub fn to_line(&self) -> Result<String> {
        match self {
            SinkRecord::Upsert(doc) => document_line(doc),
            SinkRecord::Remove { key, id } => {
                let mut tombstone = Map::new();
                tombstone.insert(key.clone(), Value::String(id.clone()));
                let value = json!({ REMOVE_TAG: tombstone });
                serde_json::to_string(&value).map_err(DocTypesError::Encode)
            }
            SinkRecord::Query { start_ts, end_ts } => {
                let value = json!({
                    QUERY_TAG: { TIMESTAMP_FIELD: { "$gte": start_ts, "$lte": end_ts } }
                });
                serde_json::to_string(&value).map_err(DocTypesError::Encode)
            }
        }
    }

    /// Parse one sink line back into a record.
    pub fn parse_line(line: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(line)?;

        if let Value::Object(map) = &value {
            if map.len() == 1 {
                if let Some(body) = map.get(REMOVE_TAG) {
                    return parse_remove(body);
                }
                if let Some(body) = map.get(QUERY_TAG) {
                    return parse_query(body);
                }
            }
        }

        value_to_document(value).map(SinkRecord::Upsert)
    }
}

/// Encode `doc` as a document line, checking that it parses back unchanged.
pub fn document_line(doc: &Document) -> Result<String> {
    let line = encode_document(doc)?;

    let parsed = match SinkRecord::parse_line(&line) {
        Ok(SinkRecord::Upsert(parsed)) => parsed,
        Ok(_) => {
            return Err(DocTypesError::Unrepresentable {
                reason: "encoding reads back as a tombstone or query".to_string(),
            })
        }
        Err(e) => {
            return Err(DocTypesError::Unrepresentable {
                reason: e.to_string(),
            })
        }
    };

    // Compare raw BSON so type changes are caught and NaN still matches itself
    if bson_bytes(&parsed)? != bson_bytes(doc)? {
        return Err(DocTypesError::Unrepresentable {
            reason: "a `$`-prefixed field reads back as an extended JSON value".to_string(),
        });
    }

    Ok(line)
}

fn bson_bytes(doc: &Document) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    doc.to_writer(&mut bytes)?;
    Ok(bytes)
}

fn parse_remove(body: &Value) -> Result<SinkRecord> {
    let entries = body.as_object().ok_or_else(|| DocTypesError::MalformedRecord {
        kind: "remove",
        reason: "tombstone body is not an object".to_string(),
    })?;

    let mut iter = entries.iter();
    match (iter.next(), iter.next()) {
        (Some((key, Value::String(id))), None) => Ok(SinkRecord::Remove {
            key: key.clone(),
            id: id.clone(),
        }),
        (Some((key, _)), None) => Err(DocTypesError::MalformedRecord {
            kind: "remove",
            reason: format!("id for key '{key}' is not a string"),
        }),
        _ => Err(DocTypesError::MalformedRecord {
            kind: "remove",
            reason: format!("expected exactly one key, got {}", entries.len()),
        }),
    }
}

fn parse_query(body: &Value) -> Result<SinkRecord> {
    let range = body
        .get(TIMESTAMP_FIELD)
        .ok_or_else(|| DocTypesError::MissingField {
            field: format!("{QUERY_TAG}.{TIMESTAMP_FIELD}"),
        })?;

    let bound = |name: &str| -> Result<i64> {
        range
            .get(name)
            .and_then(Value::as_i64)
            .ok_or_else(|| DocTypesError::MalformedRecord {
                kind: "query",
                reason: format!("missing or non-integer bound {name}"),
            })
    };

    Ok(SinkRecord::Query {
        start_ts: bound("$gte")?,
        end_ts: bound("$lte")?,
    })
}

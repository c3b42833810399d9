//! Document codec for oplog-doc-manager.
//!
//! Documents arriving from the oplog are BSON. Sinks store them as UTF-8
//! lines of canonical extended JSON so every BSON type survives the trip
//! through a text medium.
//!
//! # Modules
//!
//! - [`codec`] - `Document` ↔ canonical extended JSON
//! - [`record`] - line framing for upserts, removal tombstones and queries
//! - [`key`] - unique-key and `_ts` extraction
//!
//! # Example
//!
//! ```
//! use bson::doc;
//! use doc_types::{decode_document, encode_document};
//!
//! let doc = doc! { "_id": 1_i64, "name": "alice" };
//! let line = encode_document(&doc).unwrap();
//! assert_eq!(decode_document(&line).unwrap(), doc);
//! ```

pub mod codec;
pub mod error;
pub mod key;
pub mod record;

pub use bson::{Bson, Document};
pub use codec::{decode_document, encode_document};
pub use error::{DocTypesError, Result};
pub use key::{document_key, document_ts, key_string, typed_key, TIMESTAMP_FIELD};
pub use record::{document_line, SinkRecord};

//! Unique-key and timestamp extraction.

use bson::{Bson, Document};

/// Field carrying the oplog timestamp of a document.
pub const TIMESTAMP_FIELD: &str = "_ts";

/// Coerce a unique-key value to the string form used to identify a document.
///
/// Strings are used as-is, ObjectIds as their hex form and numbers/booleans
/// via their display form. Anything else falls back to its canonical
/// extended JSON text, which is stable for equal values.
pub fn key_string(value: &Bson) -> String {
    match value {
        Bson::String(s) => s.clone(),
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::Int32(i) => i.to_string(),
        Bson::Int64(i) => i.to_string(),
        Bson::Double(f) => f.to_string(),
        Bson::Boolean(b) => b.to_string(),
        other => other.clone().into_canonical_extjson().to_string(),
    }
}

/// Identity of a unique-key value that keeps its BSON type.
///
/// `7_i32` and `"7"` share a [`key_string`] but not a typed key.
pub fn typed_key(value: &Bson) -> String {
    value.clone().into_canonical_extjson().to_string()
}

/// Look up `key` in `doc` and return its string form.
pub fn document_key(doc: &Document, key: &str) -> Option<String> {
    doc.get(key).map(key_string)
}

/// Read the `_ts` field of a document as a position on the oplog time axis.
///
/// BSON timestamps are packed the way the oplog orders them: seconds in the
/// high 32 bits, increment in the low 32 bits. The packed value is unsigned
/// and can exceed `i64::MAX` from 2038 on, hence the wider return type.
pub fn document_ts(doc: &Document) -> Option<i128> {
    match doc.get(TIMESTAMP_FIELD)? {
        Bson::Int64(ts) => Some(i128::from(*ts)),
        Bson::Int32(ts) => Some(i128::from(*ts)),
        Bson::Timestamp(ts) => {
            let packed = (u64::from(ts.time) << 32) | u64::from(ts.increment);
            Some(i128::from(packed))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::oid::ObjectId;
    use bson::{doc, Timestamp};

    #[test]
    fn test_key_string_variants() {
        let oid = ObjectId::parse_str("507f1f77bcf86cd799439011").unwrap();
        assert_eq!(key_string(&Bson::ObjectId(oid)), "507f1f77bcf86cd799439011");
        assert_eq!(key_string(&Bson::String("abc".into())), "abc");
        assert_eq!(key_string(&Bson::Int32(7)), "7");
        assert_eq!(key_string(&Bson::Int64(-9)), "-9");
        assert_eq!(key_string(&Bson::Boolean(true)), "true");
    }

    #[test]
    fn test_key_string_nested_is_stable() {
        let a = Bson::Document(doc! { "tenant": "x", "n": 1_i32 });
        let b = Bson::Document(doc! { "tenant": "x", "n": 1_i32 });
        assert_eq!(key_string(&a), key_string(&b));
    }

    #[test]
    fn test_typed_key_distinguishes_types() {
        assert_ne!(typed_key(&Bson::Int32(7)), typed_key(&Bson::String("7".into())));
        assert_ne!(typed_key(&Bson::Double(1.0)), typed_key(&Bson::Int64(1)));
        assert_eq!(typed_key(&Bson::Int64(1)), typed_key(&Bson::Int64(1)));
        assert_eq!(key_string(&Bson::Double(1.0)), key_string(&Bson::Int64(1)));
    }

    #[test]
    fn test_document_key_missing() {
        let doc = doc! { "name": "no id" };
        assert_eq!(document_key(&doc, "_id"), None);
        assert_eq!(document_key(&doc, "name").as_deref(), Some("no id"));
    }

    #[test]
    fn test_document_ts_encodings() {
        assert_eq!(document_ts(&doc! { "_ts": 5_i64 }), Some(5));
        assert_eq!(document_ts(&doc! { "_ts": 3_i32 }), Some(3));
        let packed = document_ts(&doc! { "_ts": Timestamp { time: 2, increment: 1 } });
        assert_eq!(packed, Some((2_i128 << 32) | 1));
        assert_eq!(document_ts(&doc! { "_ts": "5" }), None);
        assert_eq!(document_ts(&doc! { "_id": 1_i32 }), None);
    }

    #[test]
    fn test_timestamps_after_2038_order_after_earlier_ones() {
        let before = document_ts(&doc! { "_ts": Timestamp { time: i32::MAX as u32, increment: 9 } });
        let after = document_ts(&doc! { "_ts": Timestamp { time: 1 << 31, increment: 0 } });
        let last = document_ts(&doc! { "_ts": Timestamp { time: u32::MAX, increment: u32::MAX } });
        assert!(before < after);
        assert!(after < last);
        assert_eq!(last, Some(i128::from(u64::MAX)));
    }
}

//! Rebuild the latest state of every document from a sink's record log.

use bson::Document;
use doc_types::{document_ts, key_string, typed_key, SinkRecord};
use std::collections::HashMap;

use crate::doc_manager::{SortOrder, TimeRangeQuery};
use crate::error::{DocManagerError, Result};

/// Last known state of the documents in a sink.
///
/// Document records are keyed by the typed value of `unique_key`, so `7` and
/// `"7"` are different documents; a later record with the same typed key
/// replaces an earlier one. Tombstones only carry the string form of the key
/// and delete every live document sharing it. Documents without the unique
/// key cannot be matched to later records and are kept as written.
/// Surviving documents keep the order of their latest write.
#[derive(Debug, Default)]
pub struct ReplayState {
    entries: Vec<Option<Document>>,
    /// String form of the key -> typed key -> entry index.
    positions: HashMap<String, HashMap<String, usize>>,
}

impl ReplayState {
    /// Replay every line of `contents`. Blank lines are skipped.
    pub fn from_bytes(contents: &[u8], unique_key: &str) -> Result<Self> {
        let mut state = Self::default();

        for (index, raw) in contents.split(|b| *b == b'\n').enumerate() {
            let line_no = index + 1;
            let line =
                std::str::from_utf8(raw).map_err(|e| DocManagerError::CorruptRecord {
                    line: line_no,
                    reason: e.to_string(),
                })?;
            if line.trim().is_empty() {
                continue;
            }

            let record =
                SinkRecord::parse_line(line).map_err(|e| DocManagerError::CorruptRecord {
                    line: line_no,
                    reason: e.to_string(),
                })?;
            state.apply(record, unique_key);
        }

        Ok(state)
    }

    fn apply(&mut self, record: SinkRecord, unique_key: &str) {
        match record {
            SinkRecord::Upsert(doc) => {
                let key = doc
                    .get(unique_key)
                    .map(|value| (key_string(value), typed_key(value)));
                let position = self.entries.len();
                self.entries.push(Some(doc));
                if let Some((id, typed)) = key {
                    let versions = self.positions.entry(id).or_default();
                    if let Some(previous) = versions.insert(typed, position) {
                        self.entries[previous] = None;
                    }
                }
            }
            SinkRecord::Remove { id, .. } => {
                let removed = self.positions.remove(&id).unwrap_or_default();
                for position in removed.into_values() {
                    self.entries[position] = None;
                }
            }
            SinkRecord::Query { .. } => {}
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.iter().flatten().count()
    }

    /// Answer a time-range query against the replayed state.
    pub fn query(self, query: &TimeRangeQuery) -> Vec<Document> {
        let mut matches: Vec<(i128, Document)> = self
            .entries
            .into_iter()
            .flatten()
            .filter_map(|doc| {
                let ts = document_ts(&doc)?;
                query.contains(ts).then_some((ts, doc))
            })
            .collect();

        // Stable sorts: equal timestamps keep write order
        match query.sort {
            Some(SortOrder::Ascending) => matches.sort_by_key(|(ts, _)| *ts),
            Some(SortOrder::Descending) => matches.sort_by(|(a, _), (b, _)| b.cmp(a)),
            None => {}
        }

        let limit = query.limit.unwrap_or(usize::MAX);
        matches.into_iter().take(limit).map(|(_, doc)| doc).collect()
    }
}

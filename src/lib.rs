//! oplog-doc-manager
//!
//! A doc manager is the last hop of an oplog-tailing change-data-capture
//! pipeline: the tailer hands it one document event at a time and it
//! forwards the event to an index backend.
//!
//! # Features
//!
//! - Canonical extended JSON encoding: every BSON type survives the sink
//! - Append-only sink log: repeated updates collapse to the latest version
//!   when the log is replayed
//! - Background auto-commit with deterministic shutdown
//! - Rollback recovery through `search` and `get_last_doc`
//!
//! # Crates
//!
//! - `doc_types` - BSON codec and sink record framing
//! - `doc_sink` - file, stdout and in-memory sinks
//!
//! # Usage
//!
//! ```ignore
//! use oplog_doc_manager::{DocManager, DocManagerConfig, FileDocManager};
//!
//! let manager = FileDocManager::new(DocManagerConfig::new("/var/lib/connector/docs.jsonl")).await?;
//! manager.upsert(&bson::doc! { "_id": 1, "_ts": 42_i64, "name": "alice" }).await?;
//! let last = manager.get_last_doc().await?;
//! manager.stop().await?;
//! ```

pub mod auto_commit;
pub mod config;
pub mod doc_manager;
pub mod error;
pub mod file_doc_manager;
pub mod replay;

pub use auto_commit::AutoCommit;
pub use config::{DocManagerConfig, DocManagerOpts};
pub use doc_manager::{DocManager, ManagerState, SortOrder, TimeRangeQuery};
pub use error::{DocManagerError, Result};
pub use file_doc_manager::FileDocManager;

// Re-export sink and codec types for convenience
pub use doc_sink::{FileSink, MemorySink, Sink, SinkTarget, StdoutSink};
pub use doc_types::{decode_document, encode_document, SinkRecord};

//! Sink abstraction for oplog-doc-manager.
//!
//! A sink is an append-only byte destination with an explicit flush. The doc
//! manager writes one record per line to it and, when the sink supports it,
//! reads the whole log back to answer time-range queries.
//!
//! # Sink Types
//!
//! - **File**: a local file opened for appending, readable for replay
//! - **Stdout**: the process's standard output, write-only
//! - **Memory**: an in-process buffer with flush counters, used by tests
//!
//! # Example
//!
//! ```ignore
//! use doc_sink::SinkTarget;
//!
//! let target = SinkTarget::parse(Some("/var/lib/connector/docs.jsonl"));
//! let mut sink = target.open().await?;
//! sink.append(b"{\"_id\":\"a\"}\n").await?;
//! sink.flush().await?;
//! ```

mod error;
mod file;
mod memory;
mod stdout;

use async_trait::async_trait;
use std::path::PathBuf;

pub use error::{Result, SinkError};
pub use file::FileSink;
pub use memory::MemorySink;
pub use stdout::StdoutSink;

/// Trait for append-only record destinations.
///
/// Implementations do not buffer across calls on their own behalf: callers
/// are expected to `flush` after each logical record.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Append raw bytes at the end of the sink.
    async fn append(&mut self, bytes: &[u8]) -> std::io::Result<()>;

    /// Hand buffered bytes to the operating system or downstream consumer.
    async fn flush(&mut self) -> std::io::Result<()>;

    /// Flush and make the written bytes durable where the medium allows it.
    async fn sync(&mut self) -> std::io::Result<()> {
        self.flush().await
    }

    /// Read back everything written so far.
    ///
    /// Returns `None` for sinks that cannot be replayed, such as stdout.
    async fn read_back(&self) -> std::io::Result<Option<Vec<u8>>> {
        Ok(None)
    }

    /// Human readable name of the destination, for logging.
    fn describe(&self) -> String;
}

/// Where a doc manager should write, resolved from a destination string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkTarget {
    /// Standard output (empty destination, unset destination or `-`)
    Stdout,
    /// Local file opened for appending
    File(PathBuf),
    /// HTTP/HTTPS endpoint of a search service
    Http(String),
}

impl SinkTarget {
    /// Parse a destination string, auto-detecting the target type.
    ///
    /// - `None`, `""` or `"-"` -> Stdout
    /// - `http://` or `https://` -> Http
    /// - `file:///path` -> File
    /// - Everything else -> File
    pub fn parse(destination: Option<&str>) -> Self {
        let destination = destination.map(str::trim).unwrap_or_default();
        if destination.is_empty() || destination == "-" {
            SinkTarget::Stdout
        } else if destination.starts_with("http://") || destination.starts_with("https://") {
            SinkTarget::Http(destination.to_string())
        } else if let Some(path) = destination.strip_prefix("file://") {
            SinkTarget::File(PathBuf::from(path))
        } else {
            SinkTarget::File(PathBuf::from(destination))
        }
    }

    /// Open the target and return a sink ready for appending.
    pub async fn open(&self) -> Result<Box<dyn Sink>> {
        match self {
            SinkTarget::Stdout => Ok(Box::new(StdoutSink::new())),
            SinkTarget::File(path) => Ok(Box::new(FileSink::open(path.clone()).await?)),
            SinkTarget::Http(url) => Err(SinkError::Unsupported {
                destination: url.clone(),
                reason: "HTTP destinations need a search service backend".to_string(),
            }),
        }
    }

    /// Get a display name for logging
    pub fn display_name(&self) -> String {
        match self {
            SinkTarget::Stdout => "<stdout>".to_string(),
            SinkTarget::File(path) => path.display().to_string(),
            SinkTarget::Http(url) => url.clone(),
        }
    }
}

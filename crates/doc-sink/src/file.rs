//! Local file sink implementation

use crate::{Sink, SinkError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Appends records to a local file.
///
/// The file only ever grows by whole records: a failed append or flush
/// truncates it back to its length after the last successful flush, and
/// [`FileSink::open`] drops a trailing partial line left by a crash.
pub struct FileSink {
    path: PathBuf,
    file: tokio::fs::File,
    /// File length after the last successful flush.
    flushed_len: u64,
    /// Bytes appended since then.
    pending: u64,
}

impl FileSink {
    /// Open `path` for appending, creating it if it does not exist.
    ///
    /// Parent directories are not created; a missing parent is reported as
    /// [`SinkError::Unavailable`].
    pub async fn open(path: PathBuf) -> crate::Result<Self> {
        let unavailable = |source| SinkError::Unavailable {
            destination: path.display().to_string(),
            source,
        };

        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(unavailable)?;

        let contents = tokio::fs::read(&path).await.map_err(unavailable)?;
        let flushed_len = complete_prefix_len(&contents);
        if flushed_len < contents.len() {
            tracing::warn!(
                "Dropping {} bytes of partial record at the end of {}",
                contents.len() - flushed_len,
                path.display()
            );
            file.set_len(flushed_len as u64).await.map_err(unavailable)?;
        }

        tracing::debug!("Opened file sink: {}", path.display());

        Ok(Self {
            path,
            file,
            flushed_len: flushed_len as u64,
            pending: 0,
        })
    }

    /// Undo everything written since the last successful flush.
    async fn roll_back(&mut self, err: std::io::Error) -> std::io::Error {
        self.pending = 0;
        if let Err(e) = self.file.set_len(self.flushed_len).await {
            tracing::warn!(
                "Failed to truncate {} after a failed write: {e}",
                self.path.display()
            );
        }
        err
    }

    /// Get the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Sink for FileSink {
    async fn append(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        match self.file.write_all(bytes).await {
            Ok(()) => {
                self.pending += bytes.len() as u64;
                Ok(())
            }
            Err(e) => Err(self.roll_back(e).await),
        }
    }

    async fn flush(&mut self) -> std::io::Result<()> {
        match self.file.flush().await {
            Ok(()) => {
                self.flushed_len += self.pending;
                self.pending = 0;
                Ok(())
            }
            Err(e) => Err(self.roll_back(e).await),
        }
    }

    async fn sync(&mut self) -> std::io::Result<()> {
        self.flush().await?;
        self.file.sync_data().await
    }

    async fn read_back(&self) -> std::io::Result<Option<Vec<u8>>> {
        tokio::fs::read(&self.path).await.map(Some)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Length of `contents` up to and including its last newline.
fn complete_prefix_len(contents: &[u8]) -> usize {
    contents
        .iter()
        .rposition(|b| *b == b'\n')
        .map_or(0, |last| last + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_append_and_read_back() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("docs.jsonl");

        let mut sink = FileSink::open(path.clone()).await.unwrap();
        sink.append(b"first\n").await.unwrap();
        sink.append(b"second\n").await.unwrap();
        sink.flush().await.unwrap();

        let contents = sink.read_back().await.unwrap().unwrap();
        assert_eq!(contents, b"first\nsecond\n");
        assert_eq!(std::fs::read(&path).unwrap(), b"first\nsecond\n");
    }

    #[tokio::test]
    async fn test_open_appends_to_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("docs.jsonl");
        std::fs::write(&path, "existing\n").unwrap();

        let mut sink = FileSink::open(path.clone()).await.unwrap();
        sink.append(b"new\n").await.unwrap();
        sink.sync().await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "existing\nnew\n");
    }

    #[tokio::test]
    async fn test_open_drops_partial_trailing_line() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("docs.jsonl");
        std::fs::write(&path, "complete\n{\"_id\":\"torn").unwrap();

        let mut sink = FileSink::open(path.clone()).await.unwrap();
        sink.append(b"next\n").await.unwrap();
        sink.flush().await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "complete\nnext\n");
    }

    #[tokio::test]
    async fn test_open_drops_file_that_is_all_partial_line() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("docs.jsonl");
        std::fs::write(&path, "{\"_id\"").unwrap();

        let sink = FileSink::open(path.clone()).await.unwrap();

        assert_eq!(sink.read_back().await.unwrap().unwrap(), b"");
    }

    #[test]
    fn test_complete_prefix_len() {
        assert_eq!(complete_prefix_len(b""), 0);
        assert_eq!(complete_prefix_len(b"abc"), 0);
        assert_eq!(complete_prefix_len(b"a\nb"), 2);
        assert_eq!(complete_prefix_len(b"a\nb\n"), 4);
    }

    #[tokio::test]
    async fn test_open_missing_parent_is_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("no-such-dir").join("docs.jsonl");

        let err = FileSink::open(path).await.err().unwrap();
        assert!(matches!(err, SinkError::Unavailable { .. }));
        assert!(err.destination().ends_with("docs.jsonl"));
    }

    #[tokio::test]
    async fn test_describe_is_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("docs.jsonl");
        let sink = FileSink::open(path.clone()).await.unwrap();
        assert_eq!(sink.describe(), path.display().to_string());
        assert_eq!(sink.path(), path.as_path());
    }
}

//! Standard output sink

use crate::Sink;
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

/// Writes records to the process's standard output.
///
/// Standard output cannot be replayed, so [`Sink::read_back`] always
/// returns `None`.
pub struct StdoutSink {
    stdout: tokio::io::Stdout,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self {
            stdout: tokio::io::stdout(),
        }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Sink for StdoutSink {
    async fn append(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.stdout.write_all(bytes).await
    }

    async fn flush(&mut self) -> std::io::Result<()> {
        self.stdout.flush().await
    }

    fn describe(&self) -> String {
        "<stdout>".to_string()
    }
}

//! In-memory sink for tests and embedding.

use crate::Sink;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Shared in-memory buffer.
///
/// Clones share the same buffer and counters, so a test can hand one clone
/// to a doc manager and inspect another.
#[derive(Clone, Default)]
pub struct MemorySink {
    buffer: Arc<Mutex<Vec<u8>>>,
    flushes: Arc<AtomicU64>,
    syncs: Arc<AtomicU64>,
    fail_writes: Arc<AtomicBool>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything appended so far.
    pub fn contents(&self) -> Vec<u8> {
        self.buffer
            .lock()
            .map(|buffer| buffer.clone())
            .unwrap_or_default()
    }

    /// Contents decoded as UTF-8, lossily.
    pub fn contents_string(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }

    /// Number of `flush` calls, including those made by `sync`.
    pub fn flushes(&self) -> u64 {
        self.flushes.load(Ordering::SeqCst)
    }

    /// Number of `sync` calls.
    pub fn syncs(&self) -> u64 {
        self.syncs.load(Ordering::SeqCst)
    }

    /// Make subsequent appends and flushes fail with `BrokenPipe`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_failure(&self) -> std::io::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "memory sink configured to fail",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn append(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.check_failure()?;
        let mut buffer = self
            .buffer
            .lock()
            .map_err(|_| std::io::Error::other("memory sink buffer poisoned"))?;
        buffer.extend_from_slice(bytes);
        Ok(())
    }

    async fn flush(&mut self) -> std::io::Result<()> {
        self.check_failure()?;
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn sync(&mut self) -> std::io::Result<()> {
        self.flush().await?;
        self.syncs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn read_back(&self) -> std::io::Result<Option<Vec<u8>>> {
        Ok(Some(self.contents()))
    }

    fn describe(&self) -> String {
        "<memory>".to_string()
    }
}

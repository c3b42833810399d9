//! Background auto-commit task.

use doc_sink::Sink;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Sink shared between the doc manager and its auto-commit task.
pub type SharedSink = Arc<Mutex<Box<dyn Sink>>>;

/// Handle to a task that syncs a sink every `interval`.
///
/// The first commit happens one full interval after [`AutoCommit::spawn`].
/// Dropping the handle cancels the task without waiting for it; use
/// [`AutoCommit::shutdown`] to also wait for an in-flight commit.
pub struct AutoCommit {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
    ticks: Arc<AtomicU64>,
    failures: Arc<AtomicU64>,
}

impl AutoCommit {
    /// Start the auto-commit task on the current Tokio runtime.
    ///
    /// `interval` must be non-zero.
    pub fn spawn(sink: SharedSink, interval: Duration) -> Self {
        let token = CancellationToken::new();
        let ticks = Arc::new(AtomicU64::new(0));
        let failures = Arc::new(AtomicU64::new(0));

        let handle = tokio::spawn(run_auto_commit(
            sink,
            interval,
            token.clone(),
            ticks.clone(),
            failures.clone(),
        ));

        tracing::debug!("Auto-commit armed every {interval:?}");

        Self {
            token,
            handle: Some(handle),
            ticks,
            failures,
        }
    }

    /// Number of commits attempted so far.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    /// Number of commits that failed.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::SeqCst)
    }

    /// Cancel the task and wait for it to finish.
    ///
    /// A commit already holding the sink lock completes first; no commit
    /// starts after this returns.
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    tracing::warn!("Auto-commit task panicked: {e}");
                }
            }
        }
        tracing::debug!("Auto-commit disarmed after {} ticks", self.ticks());
    }
}

impl Drop for AutoCommit {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn run_auto_commit(
    sink: SharedSink,
    interval: Duration,
    token: CancellationToken,
    ticks: Arc<AtomicU64>,
    failures: Arc<AtomicU64>,
) {
    let mut timer = tokio::time::interval_at(Instant::now() + interval, interval);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = timer.tick() => {
                let mut sink = sink.lock().await;
                // Re-check under the lock: shutdown may have started while waiting
                if token.is_cancelled() {
                    break;
                }
                let result = sink.sync().await;
                drop(sink);

                ticks.fetch_add(1, Ordering::SeqCst);
                if let Err(e) = result {
                    failures.fetch_add(1, Ordering::SeqCst);
                    tracing::warn!("Auto-commit failed: {e}");
                }
            }
        }
    }
}

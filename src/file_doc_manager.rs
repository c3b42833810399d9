//! Doc manager that appends document events to a file or stdout.

use async_trait::async_trait;
use bson::Document;
use doc_sink::{Sink, SinkTarget};
use doc_types::{document_key, document_line, SinkRecord};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::auto_commit::{AutoCommit, SharedSink};
use crate::config::DocManagerConfig;
use crate::doc_manager::{DocManager, ManagerState, TimeRangeQuery};
use crate::error::{DocManagerError, Result};
use crate::replay::ReplayState;

/// Doc manager writing one record per line to an append-only sink.
///
/// Upserts append the document itself rather than rewriting an earlier
/// version, so the sink is a log of facts: the latest version of a key is
/// the last document line carrying it, unless a later tombstone removes it.
/// Queries replay that log when the sink can be read back.
pub struct FileDocManager {
    unique_key: String,
    destination: String,
    record_queries: bool,
    auto_commit: AtomicBool,
    sink: SharedSink,
    committer: Mutex<Option<AutoCommit>>,
}

impl FileDocManager {
    /// Open the configured destination and, if enabled, arm auto-commit.
    pub async fn new(config: DocManagerConfig) -> Result<Self> {
        let target = SinkTarget::parse(config.destination.as_deref());
        let sink = target
            .open()
            .await
            .map_err(|source| DocManagerError::SinkUnavailable {
                destination: target.display_name(),
                source,
            })?;

        Self::with_sink(config, sink).await
    }

    /// Build a doc manager around an already opened sink.
    pub async fn with_sink(config: DocManagerConfig, sink: Box<dyn Sink>) -> Result<Self> {
        config.validate().map_err(DocManagerError::InvalidConfig)?;

        for (key, value) in &config.extra {
            tracing::debug!("Ignoring unsupported doc manager option {key}={value}");
        }

        let destination = sink.describe();
        let sink: SharedSink = Arc::new(Mutex::new(sink));

        let committer = if config.auto_commit {
            Some(AutoCommit::spawn(sink.clone(), config.auto_commit_interval))
        } else {
            None
        };

        tracing::info!(
            "Doc manager writing to {destination} (unique key '{}', auto-commit {})",
            config.unique_key,
            if config.auto_commit { "on" } else { "off" }
        );

        Ok(Self {
            unique_key: config.unique_key,
            destination,
            record_queries: config.record_queries,
            auto_commit: AtomicBool::new(config.auto_commit),
            sink,
            committer: Mutex::new(committer),
        })
    }

    pub fn unique_key(&self) -> &str {
        &self.unique_key
    }

    /// Display name of the sink.
    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Whether auto-commit is still armed.
    pub fn auto_commit(&self) -> bool {
        self.auto_commit.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> ManagerState {
        if self.auto_commit() {
            ManagerState::Running
        } else {
            ManagerState::Stopped
        }
    }

    /// Number of auto-commits run so far, or `None` once stopped.
    pub async fn auto_commit_ticks(&self) -> Option<u64> {
        self.committer.lock().await.as_ref().map(AutoCommit::ticks)
    }

    /// Write `line` followed by a newline, flushed before the lock is
    /// released so concurrent writers never interleave.
    async fn write_line(&self, line: &str) -> Result<()> {
        let mut sink = self.sink.lock().await;
        append_line(&mut **sink, line).await
    }
}

async fn append_line(sink: &mut dyn Sink, line: &str) -> Result<()> {
    let mut bytes = Vec::with_capacity(line.len() + 1);
    bytes.extend_from_slice(line.as_bytes());
    bytes.push(b'\n');

    sink.append(&bytes)
        .await
        .map_err(DocManagerError::WriteFailure)?;
    sink.flush().await.map_err(DocManagerError::WriteFailure)
}

#[async_trait]
impl DocManager for FileDocManager {
    async fn upsert(&self, doc: &Document) -> Result<()> {
        let line = document_line(doc).map_err(DocManagerError::SerializationFailure)?;
        self.write_line(&line).await?;
        tracing::trace!("Upserted document into {}", self.destination);
        Ok(())
    }

    async fn remove(&self, doc: &Document) -> Result<()> {
        let id =
            document_key(doc, &self.unique_key).ok_or_else(|| DocManagerError::MissingKey {
                key: self.unique_key.clone(),
            })?;

        tracing::debug!("Removing document {}={id}", self.unique_key);
        let line = SinkRecord::Remove {
            key: self.unique_key.clone(),
            id,
        }
        .to_line()
        .map_err(DocManagerError::SerializationFailure)?;
        self.write_line(&line).await
    }

    async fn search_with(&self, query: &TimeRangeQuery) -> Result<Vec<Document>> {
        let mut sink = self.sink.lock().await;

        let contents = sink
            .read_back()
            .await
            .map_err(DocManagerError::ReadFailure)?;

        if self.record_queries {
            let line = SinkRecord::Query {
                start_ts: query.start_ts,
                end_ts: query.end_ts,
            }
            .to_line()
            .map_err(DocManagerError::SerializationFailure)?;
            append_line(&mut **sink, &line).await?;
        }
        drop(sink);

        let Some(contents) = contents else {
            tracing::debug!(
                "Sink {} cannot be read back; query [{}, {}] has no results",
                self.destination,
                query.start_ts,
                query.end_ts
            );
            return Ok(Vec::new());
        };

        let results = ReplayState::from_bytes(&contents, &self.unique_key)?.query(query);
        tracing::debug!(
            "Query [{}, {}] matched {} documents",
            query.start_ts,
            query.end_ts,
            results.len()
        );
        Ok(results)
    }

    async fn commit(&self) -> Result<()> {
        self.sink
            .lock()
            .await
            .sync()
            .await
            .map_err(DocManagerError::WriteFailure)
    }

    async fn stop(&self) -> Result<()> {
        self.auto_commit.store(false, Ordering::SeqCst);

        let committer = self.committer.lock().await.take();
        if let Some(committer) = committer {
            committer.shutdown().await;
            tracing::info!("Doc manager for {} stopped", self.destination);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use doc_sink::MemorySink;
    use std::time::Duration;

    async fn memory_manager(config: DocManagerConfig) -> (FileDocManager, MemorySink) {
        let observer = MemorySink::new();
        let manager = FileDocManager::with_sink(config, Box::new(observer.clone()))
            .await
            .unwrap();
        (manager, observer)
    }

    fn manual() -> DocManagerConfig {
        DocManagerConfig::stdout().with_auto_commit(false)
    }

    #[tokio::test]
    async fn test_initial_state_follows_auto_commit() {
        let (running, _) = memory_manager(DocManagerConfig::stdout()).await;
        assert_eq!(running.state(), ManagerState::Running);
        assert_eq!(running.auto_commit_ticks().await, Some(0));
        running.stop().await.unwrap();

        let (stopped, _) = memory_manager(manual()).await;
        assert_eq!(stopped.state(), ManagerState::Stopped);
        assert_eq!(stopped.auto_commit_ticks().await, None);
    }

    #[tokio::test]
    async fn test_upsert_writes_one_flushed_line() {
        let (manager, observer) = memory_manager(manual()).await;

        manager.upsert(&doc! { "_id": "a", "n": 1_i32 }).await.unwrap();

        let contents = observer.contents_string();
        assert!(contents.ends_with('\n'));
        assert_eq!(contents.lines().count(), 1);
        assert_eq!(observer.flushes(), 1);
    }

    #[tokio::test]
    async fn test_remove_writes_tombstone_with_string_id() {
        let (manager, observer) = memory_manager(manual().with_unique_key("uid")).await;

        manager.remove(&doc! { "uid": 42_i64, "name": "x" }).await.unwrap();

        assert_eq!(observer.contents_string(), "{\"$remove\":{\"uid\":\"42\"}}\n");
    }

    #[tokio::test]
    async fn test_remove_without_key_writes_nothing() {
        let (manager, observer) = memory_manager(manual()).await;

        let err = manager.remove(&doc! { "name": "x" }).await.unwrap_err();

        assert!(matches!(err, DocManagerError::MissingKey { ref key } if key == "_id"));
        assert!(observer.contents().is_empty());
        assert_eq!(observer.flushes(), 0);
    }

    #[tokio::test]
    async fn test_write_failure_is_surfaced() {
        let (manager, observer) = memory_manager(manual()).await;
        observer.set_fail_writes(true);

        let err = manager.upsert(&doc! { "_id": "a" }).await.unwrap_err();
        assert!(matches!(err, DocManagerError::WriteFailure(_)));

        let err = manager.commit().await.unwrap_err();
        assert!(matches!(err, DocManagerError::WriteFailure(_)));
    }

    #[tokio::test]
    async fn test_unrepresentable_document_is_not_written() {
        let (manager, observer) = memory_manager(manual()).await;
        manager.upsert(&doc! { "_id": "a", "_ts": 1_i64 }).await.unwrap();

        for doc in [
            doc! { "_id": "p", "_ts": 2_i64, "meta": { "$oid": "zz" } },
            doc! { "_id": "q", "_ts": 3_i64, "x": { "$numberLong": "5" } },
        ] {
            let err = manager.upsert(&doc).await.unwrap_err();
            assert!(matches!(err, DocManagerError::SerializationFailure(_)));
        }

        assert_eq!(observer.contents_string().lines().count(), 1);
        let results = manager.search(0, 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(manager.get_last_doc().await.unwrap().unwrap().get_str("_id").unwrap(), "a");
    }

    #[tokio::test]
    async fn test_bulk_upsert_stops_at_first_failure() {
        let (manager, observer) = memory_manager(manual()).await;
        let docs = vec![
            doc! { "_id": "a", "_ts": 1_i64 },
            doc! { "_id": "b", "_ts": 2_i64, "meta": { "$oid": "zz" } },
            doc! { "_id": "c", "_ts": 3_i64 },
        ];

        let err = manager.bulk_upsert(&docs).await.unwrap_err();

        assert!(matches!(err, DocManagerError::SerializationFailure(_)));
        let contents = observer.contents_string();
        assert_eq!(contents.lines().count(), 1);
        assert!(contents.contains("\"a\""));
        assert!(!contents.contains("\"c\""));
    }

    #[tokio::test]
    async fn test_bulk_upsert_surfaces_write_failure() {
        let (manager, observer) = memory_manager(manual()).await;
        observer.set_fail_writes(true);

        let docs = vec![doc! { "_id": "a" }, doc! { "_id": "b" }];
        let err = manager.bulk_upsert(&docs).await.unwrap_err();

        assert!(matches!(err, DocManagerError::WriteFailure(_)));
        assert_eq!(observer.flushes(), 0);
        observer.set_fail_writes(false);
        assert!(observer.contents().is_empty());
    }

    #[tokio::test]
    async fn test_search_records_query() {
        let (manager, observer) = memory_manager(manual()).await;

        let results = manager.search(0, 10).await.unwrap();

        assert!(results.is_empty());
        assert_eq!(
            observer.contents_string(),
            "{\"$query\":{\"_ts\":{\"$gte\":0,\"$lte\":10}}}\n"
        );
    }

    #[tokio::test]
    async fn test_search_without_query_records() {
        let (manager, observer) = memory_manager(manual().with_record_queries(false)).await;

        manager.upsert(&doc! { "_id": "a", "_ts": 1_i64 }).await.unwrap();
        let results = manager.search(0, 10).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(observer.contents_string().lines().count(), 1);
    }

    #[tokio::test]
    async fn test_commit_syncs() {
        let (manager, observer) = memory_manager(manual()).await;
        manager.commit().await.unwrap();
        manager.commit().await.unwrap();
        assert_eq!(observer.syncs(), 2);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let config = DocManagerConfig::stdout().with_auto_commit_interval(Duration::from_millis(10));
        let (manager, _) = memory_manager(config).await;
        manager.stop().await.unwrap();
        manager.stop().await.unwrap();
        assert_eq!(manager.state(), ManagerState::Stopped);
    }

    #[tokio::test]
    async fn test_writes_allowed_after_stop() {
        let (manager, observer) = memory_manager(DocManagerConfig::stdout()).await;
        manager.stop().await.unwrap();

        manager.upsert(&doc! { "_id": "a" }).await.unwrap();
        assert_eq!(observer.contents_string().lines().count(), 1);
    }

    #[tokio::test]
    async fn test_rejects_invalid_config() {
        let observer = MemorySink::new();
        let result = FileDocManager::with_sink(
            DocManagerConfig::stdout().with_unique_key(""),
            Box::new(observer),
        )
        .await;
        assert!(matches!(result, Err(DocManagerError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_extra_options_are_accepted() {
        let config = manual()
            .with_option("commit_within", serde_json::json!(1000))
            .with_option("target_url", serde_json::json!("http://localhost:8080"));
        let (manager, _) = memory_manager(config).await;
        assert_eq!(manager.unique_key(), "_id");
        assert_eq!(manager.destination(), "<memory>");
    }
}

//! DocManager trait definition.
//!
//! Every backend adapter in the pipeline implements this trait. The upstream
//! oplog tailer calls `upsert`/`remove` once per mutation event and uses
//! `get_last_doc` after a replication rollback to find where the backend
//! left off.

use async_trait::async_trait;
use bson::Document;

use crate::error::Result;

/// Ordering applied to time-range query results by `_ts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// A closed `_ts` interval query with optional ordering and row limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRangeQuery {
    pub start_ts: i64,
    pub end_ts: i64,
    /// `None` keeps the backend's natural order.
    pub sort: Option<SortOrder>,
    pub limit: Option<usize>,
}

impl TimeRangeQuery {
    /// Query documents with `start_ts <= _ts <= end_ts`.
    pub fn new(start_ts: i64, end_ts: i64) -> Self {
        Self {
            start_ts,
            end_ts,
            sort: None,
            limit: None,
        }
    }

    /// Query every document that carries a timestamp.
    pub fn everything() -> Self {
        Self::new(i64::MIN, i64::MAX)
    }

    pub fn sorted(mut self, order: SortOrder) -> Self {
        self.sort = Some(order);
        self
    }

    pub fn limit(mut self, rows: usize) -> Self {
        self.limit = Some(rows);
        self
    }

    /// Whether `ts` falls inside the closed interval.
    ///
    /// An upper bound of `i64::MAX` is open-ended, so it also admits packed
    /// oplog timestamps from 2038 on, which exceed `i64::MAX`.
    pub fn contains(&self, ts: i128) -> bool {
        let end = if self.end_ts == i64::MAX {
            i128::MAX
        } else {
            i128::from(self.end_ts)
        };
        i128::from(self.start_ts) <= ts && ts <= end
    }
}

/// Lifecycle of a doc manager's auto-commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    /// Auto-commit is armed.
    Running,
    /// Auto-commit is disarmed; restarting requires a new doc manager.
    Stopped,
}

/// Trait for forwarding document events to an index backend.
///
/// All methods take `&self` so one doc manager can be shared behind an `Arc`
/// by several oplog worker tasks.
#[async_trait]
pub trait DocManager: Send + Sync {
    /// Insert or update a document.
    ///
    /// There is no separate insert path: the backend records the latest
    /// version of the document and readers resolve duplicates by key.
    async fn upsert(&self, doc: &Document) -> Result<()>;

    /// Upsert documents in order, stopping at the first failure.
    async fn bulk_upsert(&self, docs: &[Document]) -> Result<()> {
        for doc in docs {
            self.upsert(doc).await?;
        }
        Ok(())
    }

    /// Remove the document identified by the unique key field of `doc`.
    async fn remove(&self, doc: &Document) -> Result<()>;

    /// Find documents whose `_ts` falls in `[start_ts, end_ts]`.
    async fn search(&self, start_ts: i64, end_ts: i64) -> Result<Vec<Document>> {
        self.search_with(&TimeRangeQuery::new(start_ts, end_ts)).await
    }

    /// Run a time-range query with ordering and limit.
    async fn search_with(&self, query: &TimeRangeQuery) -> Result<Vec<Document>>;

    /// Flush everything written so far to the backend.
    async fn commit(&self) -> Result<()>;

    /// Disarm auto-commit. No auto-commit runs after this returns.
    async fn stop(&self) -> Result<()>;

    /// Return the most recent document by `_ts`, if any.
    ///
    /// This is the rollback-recovery entry point.
    async fn get_last_doc(&self) -> Result<Option<Document>> {
        let query = TimeRangeQuery::everything()
            .sorted(SortOrder::Descending)
            .limit(1);
        Ok(self.search_with(&query).await?.into_iter().next())
    }
}

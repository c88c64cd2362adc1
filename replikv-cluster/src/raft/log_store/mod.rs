//! Durable Raft log storage.
//!
//! Implements OpenRaft's `RaftLogStorage` on top of a single append-only
//! log file plus small JSON files for the vote and log metadata:
//!
//! ```text
//! raft/
//! ├── log.ndjson   # one JSON entry per line
//! ├── vote.json    # current vote
//! └── meta.json    # last_purged_log_id, committed
//! ```
//!
//! Appends are fsynced before OpenRaft is told they are durable. Truncate and
//! purge rewrite the log through a temp file and rename.

mod inner;

use crate::types::{NodeId, StoreEntry, StoreLogId, StoreStorageError, TypeConfig};
use inner::LogStoreInner;
use openraft::storage::{LogFlushed, RaftLogStorage};
use openraft::{LogState, OptionalSend, RaftLogReader, StorageIOError, Vote};
use std::fmt::Debug;
use std::fs;
use std::ops::RangeBounds;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Persistent storage for Raft log entries and vote state.
#[derive(Clone)]
pub struct LogStore {
    inner: Arc<RwLock<LogStoreInner>>,
}

impl LogStore {
    /// Create or open log storage in the given directory.
    pub fn open(dir: PathBuf) -> Result<Self, std::io::Error> {
        fs::create_dir_all(&dir)?;
        let inner = LogStoreInner::load(dir)?;

        tracing::debug!(
            entries = inner.logs.len(),
            committed = ?inner.meta.committed,
            "opened raft log"
        );

        Ok(Self {
            inner: Arc::new(RwLock::new(inner)),
        })
    }
}

impl RaftLogReader<TypeConfig> for LogStore {
    async fn try_get_log_entries<RB: RangeBounds<u64> + Clone + Debug>(
        &mut self,
        range: RB,
    ) -> Result<Vec<StoreEntry>, StoreStorageError> {
        let inner = self.inner.read().await;
        Ok(inner.logs.range(range).map(|(_, e)| e.clone()).collect())
    }
}

impl RaftLogStorage<TypeConfig> for LogStore {
    type LogReader = Self;

    async fn get_log_state(&mut self) -> Result<LogState<TypeConfig>, StoreStorageError> {
        let inner = self.inner.read().await;

        let last_purged_log_id = inner.meta.last_purged_log_id;
        let last_log_id = inner
            .logs
            .values()
            .last()
            .map(|e| e.log_id)
            .or(last_purged_log_id);

        Ok(LogState {
            last_purged_log_id,
            last_log_id,
        })
    }

    async fn save_committed(
        &mut self,
        committed: Option<StoreLogId>,
    ) -> Result<(), StoreStorageError> {
        let mut inner = self.inner.write().await;
        inner.meta.committed = committed;
        inner
            .save_meta()
            .map_err(|e| StorageIOError::write_logs(&e))?;
        Ok(())
    }

    async fn read_committed(&mut self) -> Result<Option<StoreLogId>, StoreStorageError> {
        Ok(self.inner.read().await.meta.committed)
    }

    async fn save_vote(&mut self, vote: &Vote<NodeId>) -> Result<(), StoreStorageError> {
        let mut inner = self.inner.write().await;
        inner
            .save_vote(vote)
            .map_err(|e| StorageIOError::write_vote(&e))?;
        Ok(())
    }

    async fn read_vote(&mut self) -> Result<Option<Vote<NodeId>>, StoreStorageError> {
        Ok(self.inner.read().await.vote)
    }

    async fn append<I>(
        &mut self,
        entries: I,
        callback: LogFlushed<TypeConfig>,
    ) -> Result<(), StoreStorageError>
    where
        I: IntoIterator<Item = StoreEntry> + OptionalSend,
        I::IntoIter: OptionalSend,
    {
        let mut inner = self.inner.write().await;
        inner
            .append(entries.into_iter().collect())
            .map_err(|e| StorageIOError::write_logs(&e))?;

        callback.log_io_completed(Ok(()));
        Ok(())
    }

    async fn truncate(&mut self, log_id: StoreLogId) -> Result<(), StoreStorageError> {
        tracing::debug!(%log_id, "truncating log");
        let mut inner = self.inner.write().await;
        inner
            .truncate(log_id)
            .map_err(|e| StorageIOError::write_logs(&e))?;
        Ok(())
    }

    async fn purge(&mut self, log_id: StoreLogId) -> Result<(), StoreStorageError> {
        tracing::debug!(%log_id, "purging log");
        let mut inner = self.inner.write().await;
        inner
            .purge(log_id)
            .map_err(|e| StorageIOError::write_logs(&e))?;
        Ok(())
    }

    async fn get_log_reader(&mut self) -> Self::LogReader {
        self.clone()
    }
}

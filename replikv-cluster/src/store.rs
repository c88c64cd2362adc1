//! The store: leader-gated writes and local reads.

use crate::command::Command;
use crate::engine::{ConsensusEngine, NodeRole};
use crate::error::{StoreError, StoreResult};
use crate::state::{ApplyResult, KeyValueMap};
use std::sync::Arc;
use std::time::Duration;

/// Default bound on waiting for a write to commit and apply.
pub const DEFAULT_APPLY_TIMEOUT: Duration = Duration::from_secs(10);

/// Client-facing key-value store.
///
/// Writes go through the consensus engine and are only accepted while this
/// node is leader. Reads are served from the local map and may be stale on
/// followers.
pub struct Store {
    engine: Arc<dyn ConsensusEngine>,
    map: Arc<KeyValueMap>,
    apply_timeout: Duration,
}

impl Store {
    /// Create a store over `engine`, reading from `map`.
    ///
    /// `map` must be the map the engine's state machine applies to.
    pub fn new(engine: Arc<dyn ConsensusEngine>, map: Arc<KeyValueMap>) -> Self {
        Self {
            engine,
            map,
            apply_timeout: DEFAULT_APPLY_TIMEOUT,
        }
    }

    /// Override the apply timeout.
    pub fn with_apply_timeout(mut self, timeout: Duration) -> Self {
        self.apply_timeout = timeout;
        self
    }

    /// The engine behind this store.
    pub fn engine(&self) -> &Arc<dyn ConsensusEngine> {
        &self.engine
    }

    /// Read `key` from the local map.
    pub fn get(&self, key: &str) -> Option<String> {
        self.map.get(key)
    }

    /// Replicate `key = value`.
    pub async fn set(&self, key: impl Into<String>, value: impl Into<String>) -> StoreResult<()> {
        self.submit(Command::set(key, value)).await
    }

    /// Replicate removal of `key`.
    pub async fn delete(&self, key: impl Into<String>) -> StoreResult<()> {
        self.submit(Command::delete(key)).await
    }

    async fn submit(&self, cmd: Command) -> StoreResult<()> {
        let role = self.engine.current_role();
        if role != NodeRole::Leader {
            let leader = self.engine.leader_addr();
            tracing::debug!(%role, op = cmd.op(), leader = ?leader, "rejecting write on non-leader");
            return Err(StoreError::NotLeader { leader });
        }

        let encoded = cmd.encode()?;
        match self.engine.apply(encoded, self.apply_timeout).await {
            Ok(ApplyResult::Applied) => Ok(()),
            Ok(ApplyResult::Rejected { reason }) => Err(StoreError::ApplyFailed(reason)),
            Err(e) => {
                tracing::warn!(op = cmd.op(), error = %e, "write failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fake::FakeEngine;
    use crate::state::KvStateMachine;
    use std::sync::atomic::Ordering;

    fn store_with(role: NodeRole) -> (Store, Arc<FakeEngine>) {
        let map = Arc::new(KeyValueMap::new());
        let engine = Arc::new(FakeEngine::new(KvStateMachine::new(map.clone()), role));
        (Store::new(engine.clone(), map), engine)
    }

    #[tokio::test]
    async fn leader_write_is_visible_on_return() {
        let (store, _engine) = store_with(NodeRole::Leader);

        store.set("user1", "batman").await.expect("set");
        assert_eq!(store.get("user1").as_deref(), Some("batman"));

        store.set("user1", "robin").await.expect("overwrite");
        assert_eq!(store.get("user1").as_deref(), Some("robin"));

        store.delete("user1").await.expect("delete");
        assert_eq!(store.get("user1"), None);
    }

    #[tokio::test]
    async fn follower_rejects_without_submitting() {
        let (store, engine) = store_with(NodeRole::Follower);
        *engine.leader.lock() = Some("127.0.0.1:9000".to_string());

        let err = store.set("a", "1").await.unwrap_err();
        match err {
            StoreError::NotLeader { leader } => {
                assert_eq!(leader.as_deref(), Some("127.0.0.1:9000"))
            }
            other => panic!("expected NotLeader, got {other:?}"),
        }

        let err = store.delete("a").await.unwrap_err();
        assert!(err.is_not_leader());

        assert_eq!(engine.apply_calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.get("a"), None);
    }

    #[tokio::test]
    async fn candidate_rejects_writes() {
        let (store, engine) = store_with(NodeRole::Candidate);
        assert!(store.set("a", "1").await.unwrap_err().is_not_leader());
        assert_eq!(engine.apply_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn slow_apply_times_out() {
        let map = Arc::new(KeyValueMap::new());
        let mut engine = FakeEngine::new(KvStateMachine::new(map.clone()), NodeRole::Leader);
        engine.apply_delay = Some(Duration::from_secs(5));
        let store =
            Store::new(Arc::new(engine), map).with_apply_timeout(Duration::from_millis(20));

        let err = store.set("a", "1").await.unwrap_err();
        assert!(matches!(err, StoreError::ApplyTimeout(_)));
    }

    #[tokio::test]
    async fn empty_key_round_trips() {
        let (store, _engine) = store_with(NodeRole::Leader);
        store.set("", "blank").await.expect("set");
        assert_eq!(store.get("").as_deref(), Some("blank"));
    }
}

//! Cluster membership: admitting new voters.

use crate::engine::{ConsensusEngine, NodeRole};
use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Whether a join request must reach the leader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinPolicy {
    /// Hand every request to the engine and let it refuse if it must.
    #[default]
    Any,
    /// Refuse with `NotLeader` unless this node is leader.
    LeaderOnly,
}

/// Adds remote nodes to the voter set.
pub struct MembershipManager {
    engine: Arc<dyn ConsensusEngine>,
    policy: JoinPolicy,
}

impl MembershipManager {
    /// Create a manager over `engine`.
    pub fn new(engine: Arc<dyn ConsensusEngine>, policy: JoinPolicy) -> Self {
        Self { engine, policy }
    }

    /// The configured join policy.
    pub fn policy(&self) -> JoinPolicy {
        self.policy
    }

    /// Current voters.
    pub fn voters(&self) -> Vec<String> {
        self.engine.voters()
    }

    /// Add the node at Raft address `addr` as a voter.
    ///
    /// Joining an address that already votes succeeds without change.
    pub async fn join(&self, addr: &str) -> StoreResult<()> {
        let addr = addr.trim();
        if addr.is_empty() {
            return Err(StoreError::Membership("empty peer address".to_string()));
        }

        if self.policy == JoinPolicy::LeaderOnly && self.engine.current_role() != NodeRole::Leader
        {
            return Err(StoreError::NotLeader {
                leader: self.engine.leader_addr(),
            });
        }

        if self.engine.voters().iter().any(|v| v == addr) {
            tracing::info!(peer = %addr, "peer already a voter");
            return Ok(());
        }

        tracing::info!(peer = %addr, "received join request for remote node");
        self.engine.add_voter(addr).await.map_err(|e| match e {
            e @ (StoreError::Membership(_) | StoreError::NotLeader { .. }) => e,
            other => StoreError::Membership(other.to_string()),
        })?;

        tracing::info!(peer = %addr, "node joined successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fake::FakeEngine;
    use crate::state::{KeyValueMap, KvStateMachine};
    use std::sync::atomic::Ordering;

    fn engine(role: NodeRole) -> Arc<FakeEngine> {
        Arc::new(FakeEngine::new(
            KvStateMachine::new(Arc::new(KeyValueMap::new())),
            role,
        ))
    }

    #[tokio::test]
    async fn join_is_idempotent() {
        let engine = engine(NodeRole::Leader);
        let manager = MembershipManager::new(engine.clone(), JoinPolicy::Any);

        manager.join("127.0.0.1:9001").await.expect("first join");
        let after_first = manager.voters();
        manager.join("127.0.0.1:9001").await.expect("second join");

        assert_eq!(manager.voters(), after_first);
        assert_eq!(after_first.len(), 2);
        assert_eq!(engine.add_voter_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn existing_voter_is_not_resubmitted() {
        let engine = engine(NodeRole::Leader);
        let manager = MembershipManager::new(engine.clone(), JoinPolicy::Any);

        manager.join("127.0.0.1:9000").await.expect("join self");
        assert_eq!(engine.add_voter_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn leader_only_policy_refuses_on_follower() {
        let engine = engine(NodeRole::Follower);
        *engine.leader.lock() = Some("127.0.0.1:9000".to_string());

        let manager = MembershipManager::new(engine.clone(), JoinPolicy::LeaderOnly);
        let err = manager.join("127.0.0.1:9002").await.unwrap_err();
        assert!(err.is_not_leader());

        let manager = MembershipManager::new(engine.clone(), JoinPolicy::Any);
        manager.join("127.0.0.1:9002").await.expect("any policy forwards");
        assert_eq!(engine.add_voter_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_address_is_refused() {
        let manager = MembershipManager::new(engine(NodeRole::Leader), JoinPolicy::Any);
        assert!(matches!(
            manager.join("  ").await,
            Err(StoreError::Membership(_))
        ));
    }
}

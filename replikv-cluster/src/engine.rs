//! The consensus engine seen by the store.
//!
//! The store and the membership manager only need a handful of engine
//! capabilities. [`ConsensusEngine`] names them so the Raft binding in
//! [`crate::raft`] can be swapped for an in-process fake in tests.

use crate::command::EncodedCommand;
use crate::error::StoreResult;
use crate::state::ApplyResult;
use async_trait::async_trait;
use openraft::ServerState;
use std::fmt;
use std::time::Duration;

/// Role of this node as last observed from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    /// Accepts writes and membership changes.
    Leader,
    /// Replicates from a leader.
    Follower,
    /// Running an election.
    Candidate,
}

impl From<ServerState> for NodeRole {
    fn from(state: ServerState) -> Self {
        match state {
            ServerState::Leader => NodeRole::Leader,
            ServerState::Candidate => NodeRole::Candidate,
            ServerState::Follower | ServerState::Learner | ServerState::Shutdown => {
                NodeRole::Follower
            }
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRole::Leader => write!(f, "leader"),
            NodeRole::Follower => write!(f, "follower"),
            NodeRole::Candidate => write!(f, "candidate"),
        }
    }
}

/// Engine capabilities used by the write gate and the membership manager.
#[async_trait]
pub trait ConsensusEngine: Send + Sync {
    /// Submit a command and wait until it is committed and applied locally.
    ///
    /// Fails with `ApplyTimeout` if that takes longer than `timeout`, and
    /// with `ApplyFailed` if the engine rejects the command.
    async fn apply(&self, command: EncodedCommand, timeout: Duration)
    -> StoreResult<ApplyResult>;

    /// Current role of this node.
    fn current_role(&self) -> NodeRole;

    /// Raft address of the current leader, if known.
    fn leader_addr(&self) -> Option<String>;

    /// Raft addresses of the current voters.
    fn voters(&self) -> Vec<String>;

    /// Make `addr` a voting member.
    ///
    /// Succeeds without change if `addr` already votes.
    async fn add_voter(&self, addr: &str) -> StoreResult<()>;
}

//! Error types for store, membership and engine operations.

use crate::types::NodeId;
use openraft::BasicNode;
use std::time::Duration;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Type alias for OpenRaft Raft errors.
pub type RaftError<E = openraft::error::Infallible> = openraft::error::RaftError<NodeId, E>;

/// Type alias for OpenRaft RPC errors.
pub type RPCError<E = openraft::error::Infallible> =
    openraft::error::RPCError<NodeId, BasicNode, RaftError<E>>;

/// Type alias for client write errors.
pub type ClientWriteError = openraft::error::ClientWriteError<NodeId, BasicNode>;

/// Type alias for initialize errors.
pub type InitializeError = openraft::error::InitializeError<NodeId, BasicNode>;

/// Errors produced while decoding a replicated command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The `op` field was empty or not one of the known operations.
    #[error("unrecognized command op: {0:?}")]
    UnknownOp(String),

    /// The payload is not a command object at all.
    #[error("malformed command: {0}")]
    Malformed(String),
}

/// Errors that can occur in store and cluster operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A client request body could not be parsed.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// A write or leader-gated join reached a node that is not the leader.
    #[error("not the leader{}", leader.as_deref().map(|l| format!(", leader is {l}")).unwrap_or_default())]
    NotLeader {
        /// Raft address of the current leader, if known.
        leader: Option<String>,
    },

    /// The engine did not commit and apply the command in time.
    ///
    /// The command may still commit later.
    #[error("command was not applied within {0:?}")]
    ApplyTimeout(Duration),

    /// The engine rejected the command or the apply step reported a failure.
    #[error("apply failed: {0}")]
    ApplyFailed(String),

    /// A command could not be encoded for the log.
    #[error("encode error: {0}")]
    Encode(String),

    /// A command could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Adding a voter failed.
    #[error("membership change failed: {0}")]
    Membership(String),

    /// Snapshot or peer list persistence failed.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// The consensus engine could not be opened or failed fatally.
    #[error("engine error: {0}")]
    Engine(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Whether the error is a leadership rejection.
    pub fn is_not_leader(&self) -> bool {
        matches!(self, StoreError::NotLeader { .. })
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Persistence(e.to_string())
    }
}

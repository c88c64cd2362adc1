//! Type definitions for OpenRaft integration.
//!
//! OpenRaft requires a type configuration naming every concrete type used by
//! the Raft implementation. This module defines the store's configuration and
//! the aliases the rest of the crate uses.

use crate::command::EncodedCommand;
use crate::state::ApplyResult;
use openraft::BasicNode;
use sha2::{Digest, Sha256};
use std::io::Cursor;

/// Node ID type for the cluster.
///
/// Derived from a node's Raft address with [`node_id_for`], so the address
/// stays the identity operators deal with.
pub type NodeId = u64;

openraft::declare_raft_types!(
    /// OpenRaft type configuration for the key-value store.
    pub TypeConfig:
        D = EncodedCommand,
        R = ApplyResult,
);

/// Type alias for Raft instance.
pub type StoreRaft = openraft::Raft<TypeConfig>;

/// Type alias for log entry.
pub type StoreEntry = openraft::Entry<TypeConfig>;

/// Type alias for vote.
pub type StoreVote = openraft::Vote<NodeId>;

/// Type alias for log ID.
pub type StoreLogId = openraft::LogId<NodeId>;

/// Type alias for stored membership.
pub type StoreMembership = openraft::StoredMembership<NodeId, BasicNode>;

/// Type alias for snapshot metadata.
pub type StoreSnapshotMeta = openraft::SnapshotMeta<NodeId, BasicNode>;

/// Type alias for snapshot.
pub type StoreSnapshot = openraft::storage::Snapshot<TypeConfig>;

/// Type alias for storage error.
pub type StoreStorageError = openraft::StorageError<NodeId>;

/// Type alias for metrics.
pub type StoreMetrics = openraft::RaftMetrics<NodeId, BasicNode>;

/// Derive the numeric node id for a Raft address.
///
/// Uses the first eight bytes of the address's SHA-256 digest, big-endian.
pub fn node_id_for(addr: &str) -> NodeId {
    Sha256::digest(addr.as_bytes())
        .iter()
        .take(8)
        .fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
}

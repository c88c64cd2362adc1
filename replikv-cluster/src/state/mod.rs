//! Replicated key-value state.
//!
//! The state machine receives committed log entries (encoded [`Command`]s)
//! and applies them to the key-value map. All nodes apply the same entries in
//! the same order, so all maps converge.
//!
//! ## Module Structure
//!
//! - `machine`: the adapter applying commands to the map
//! - `snapshot`: the point-in-time image of the map
//! - `raft_sm`: OpenRaft trait implementations and snapshot bookkeeping
//!
//! [`Command`]: crate::command::Command

mod machine;
mod raft_sm;
mod snapshot;

pub use machine::KvStateMachine;
pub use raft_sm::StateMachineStore;
pub use snapshot::SnapshotImage;

use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The key-value map shared between the read path and the state machine.
///
/// Only [`KvStateMachine`] mutates it; everyone else reads.
#[derive(Debug, Default)]
pub struct KeyValueMap {
    entries: Mutex<HashMap<String, String>>,
}

impl KeyValueMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a key.
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the map holds no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock()
    }
}

/// Result of applying one log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyResult {
    /// The entry was applied (or carried no command).
    Applied,
    /// The entry could not be applied. The map was left untouched.
    Rejected {
        /// Why the entry was skipped.
        reason: String,
    },
}

impl ApplyResult {
    /// Whether the entry was applied.
    pub fn is_applied(&self) -> bool {
        matches!(self, ApplyResult::Applied)
    }
}

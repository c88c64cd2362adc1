//! Shared application state for API handlers.

use replikv_cluster::{MembershipManager, Store};
use std::sync::Arc;

/// Shared application state passed to all handlers.
pub struct AppState {
    /// Write gate and local reads.
    pub store: Arc<Store>,
    /// Cluster membership changes.
    pub membership: Arc<MembershipManager>,
}

impl AppState {
    /// Create new application state.
    pub fn new(store: Arc<Store>, membership: Arc<MembershipManager>) -> Self {
        Self { store, membership }
    }
}

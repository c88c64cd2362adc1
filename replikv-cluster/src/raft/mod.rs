//! OpenRaft binding: the engine, its log store and its snapshot store.

mod engine;
pub mod log_store;
pub mod snapshot_store;

pub use engine::RaftEngine;
pub use log_store::LogStore;
pub use snapshot_store::{PersistedSnapshot, SnapshotSink, SnapshotStore};

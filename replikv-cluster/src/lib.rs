//! Raft-replicated key-value store core.
//!
//! A small set of nodes agree, through Raft (via OpenRaft), on an ordered log
//! of mutation commands. Every node applies that log to its own in-memory
//! map, so all maps converge. Writes are accepted only by the leader; reads
//! are served from the local map.
//!
//! # Architecture
//!
//! ```text
//!   set/delete                 get               join
//!       │                       │                  │
//!  ┌────▼────────────┐          │        ┌─────────▼─────────┐
//!  │  Store          │          │        │ MembershipManager │
//!  │  (write gate)   │          │        └─────────┬─────────┘
//!  └────┬────────────┘          │                  │
//!       │ encoded command       │                  │ add voter
//!  ┌────▼──────────────────────────────────────────▼────┐
//!  │              RaftEngine (OpenRaft)                 │◄──► peers
//!  │     LogStore · SnapshotStore · NetworkClient       │   /raft/*
//!  └────┬───────────────────────────────────────────────┘
//!       │ committed entries, in order
//!  ┌────▼────────────┐     ┌──────────────┐
//!  │ KvStateMachine  │────►│ KeyValueMap  │◄──── local reads
//!  └─────────────────┘     └──────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use replikv_cluster::{Node, NodeConfig};
//!
//! let config = NodeConfig::builder()
//!     .raft_addr("127.0.0.1:9000")
//!     .data_dir("/var/lib/replikv/node1")
//!     .build()?;
//!
//! let node = Node::start(config).await?;
//! node.store().set("user1", "batman").await?;
//! assert_eq!(node.store().get("user1").as_deref(), Some("batman"));
//! ```

pub mod bootstrap;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod membership;
pub mod network;
pub mod node;
pub mod raft;
pub mod state;
pub mod store;
pub mod types;

// Re-export main types
pub use bootstrap::{NodeLifecycle, StartupMode};
pub use command::{Command, EncodedCommand};
pub use config::NodeConfig;
pub use engine::{ConsensusEngine, NodeRole};
pub use error::{DecodeError, StoreError, StoreResult};
pub use membership::{JoinPolicy, MembershipManager};
pub use node::Node;
pub use raft::RaftEngine;
pub use state::{ApplyResult, KeyValueMap, KvStateMachine, SnapshotImage};
pub use store::Store;
pub use types::{NodeId, TypeConfig};

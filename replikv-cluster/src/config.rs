//! Node configuration.

use crate::membership::JoinPolicy;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a store node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Address the client HTTP API listens on (e.g. "0.0.0.0:8000").
    pub http_addr: String,

    /// Raft address. Used to bind the Raft RPC listener and as this node's
    /// identity in the cluster, so it must be reachable by peers.
    pub raft_addr: String,

    /// HTTP address of an existing member to join through, if any.
    pub join_addr: Option<String>,

    /// Directory for the Raft log, snapshots and peer list.
    pub data_dir: PathBuf,

    /// Raft timing configuration.
    pub raft: RaftConfig,

    /// Snapshot configuration.
    pub snapshot: SnapshotConfig,

    /// How long a write may wait to be committed and applied, in milliseconds.
    pub apply_timeout_ms: u64,

    /// Whether join requests are only served by the leader.
    pub join_policy: JoinPolicy,
}

/// Raft timing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaftConfig {
    /// Election timeout range (min, max) in milliseconds.
    pub election_timeout_ms: (u64, u64),

    /// Heartbeat interval in milliseconds.
    pub heartbeat_interval_ms: u64,

    /// Maximum entries per AppendEntries RPC.
    pub max_entries_per_append: u64,
}

/// Snapshot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Build a snapshot after this many entries since the last one.
    pub snapshot_threshold: u64,

    /// Number of persisted snapshots to keep.
    pub retain: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0:8000".to_string(),
            raft_addr: "127.0.0.1:9000".to_string(),
            join_addr: None,
            data_dir: PathBuf::from("./replikv-data"),
            raft: RaftConfig::default(),
            snapshot: SnapshotConfig::default(),
            apply_timeout_ms: 10_000,
            join_policy: JoinPolicy::default(),
        }
    }
}

impl Default for RaftConfig {
    fn default() -> Self {
        Self {
            election_timeout_ms: (150, 300),
            heartbeat_interval_ms: 50,
            max_entries_per_append: 100,
        }
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            snapshot_threshold: 8192,
            retain: 2,
        }
    }
}

impl NodeConfig {
    /// Create a new configuration builder.
    pub fn builder() -> NodeConfigBuilder {
        NodeConfigBuilder::default()
    }

    /// The apply timeout as a Duration.
    pub fn apply_timeout(&self) -> Duration {
        Duration::from_millis(self.apply_timeout_ms)
    }

    /// Socket address for the HTTP listener.
    pub fn http_bind_addr(&self) -> Result<SocketAddr, String> {
        bind_addr(&self.http_addr)
    }

    /// Socket address for the Raft listener.
    pub fn raft_bind_addr(&self) -> Result<SocketAddr, String> {
        bind_addr(&self.raft_addr)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        self.http_bind_addr()?;
        self.raft_bind_addr()?;

        if self.data_dir.as_os_str().is_empty() {
            return Err("data_dir is required".to_string());
        }

        if self.join_addr.as_deref().is_some_and(|a| a.trim().is_empty()) {
            return Err("join_addr must not be empty when set".to_string());
        }

        let (min_election, max_election) = self.raft.election_timeout_ms;
        if min_election >= max_election {
            return Err(format!(
                "election_timeout_ms min ({min_election}) must be below max ({max_election})"
            ));
        }
        if self.raft.heartbeat_interval_ms >= min_election / 2 {
            return Err(format!(
                "heartbeat_interval_ms ({}) should be << election_timeout_ms ({})",
                self.raft.heartbeat_interval_ms, min_election
            ));
        }

        if self.apply_timeout_ms == 0 {
            return Err("apply_timeout_ms must be > 0".to_string());
        }
        if self.snapshot.retain == 0 {
            return Err("snapshot retain must be >= 1".to_string());
        }

        Ok(())
    }
}

/// Parse a listen address, treating a bare ":port" as all interfaces.
pub fn bind_addr(addr: &str) -> Result<SocketAddr, String> {
    let full = if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_string()
    };
    full.parse()
        .map_err(|e: std::net::AddrParseError| format!("invalid address {addr:?}: {e}"))
}

/// Builder for NodeConfig.
#[derive(Debug, Default)]
pub struct NodeConfigBuilder {
    config: NodeConfig,
}

impl NodeConfigBuilder {
    /// Set the HTTP API address.
    pub fn http_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.http_addr = addr.into();
        self
    }

    /// Set the Raft address.
    pub fn raft_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.raft_addr = addr.into();
        self
    }

    /// Join an existing cluster through the member at `addr`.
    pub fn join_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.join_addr = Some(addr.into());
        self
    }

    /// Set the data directory.
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set election timeout range in milliseconds.
    pub fn election_timeout_ms(mut self, min: u64, max: u64) -> Self {
        self.config.raft.election_timeout_ms = (min, max);
        self
    }

    /// Set heartbeat interval in milliseconds.
    pub fn heartbeat_interval_ms(mut self, ms: u64) -> Self {
        self.config.raft.heartbeat_interval_ms = ms;
        self
    }

    /// Set snapshot threshold.
    pub fn snapshot_threshold(mut self, entries: u64) -> Self {
        self.config.snapshot.snapshot_threshold = entries;
        self
    }

    /// Set how many snapshots are kept on disk.
    pub fn snapshot_retain(mut self, count: usize) -> Self {
        self.config.snapshot.retain = count;
        self
    }

    /// Set the apply timeout.
    pub fn apply_timeout(mut self, timeout: Duration) -> Self {
        self.config.apply_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the join policy.
    pub fn join_policy(mut self, policy: JoinPolicy) -> Self {
        self.config.join_policy = policy;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Result<NodeConfig, String> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = NodeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.apply_timeout(), Duration::from_secs(10));
        assert_eq!(config.snapshot.retain, 2);
    }

    #[test]
    fn bare_port_binds_all_interfaces() {
        let addr = bind_addr(":8000").expect("parse");
        assert_eq!(addr.to_string(), "0.0.0.0:8000");
        assert!(bind_addr("localhost").is_err());
    }

    #[test]
    fn builder_rejects_bad_timing() {
        let err = NodeConfig::builder()
            .election_timeout_ms(100, 200)
            .heartbeat_interval_ms(80)
            .build()
            .unwrap_err();
        assert!(err.contains("heartbeat_interval_ms"));
    }

    #[test]
    fn builder_sets_join_target() {
        let config = NodeConfig::builder()
            .raft_addr("127.0.0.1:9001")
            .join_addr("127.0.0.1:8000")
            .data_dir("/tmp/node1")
            .join_policy(JoinPolicy::LeaderOnly)
            .build()
            .expect("valid config");
        assert_eq!(config.join_addr.as_deref(), Some("127.0.0.1:8000"));
        assert_eq!(config.join_policy, JoinPolicy::LeaderOnly);
    }
}

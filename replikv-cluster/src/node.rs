//! Node - opens the engine and brings the node into the cluster.

use crate::bootstrap::{self, NodeLifecycle, StartupMode};
use crate::config::NodeConfig;
use crate::engine::{ConsensusEngine, NodeRole};
use crate::error::{StoreError, StoreResult};
use crate::membership::MembershipManager;
use crate::raft::RaftEngine;
use crate::state::{KeyValueMap, KvStateMachine};
use crate::store::Store;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

/// How long a joining node waits for the member to admit it.
pub const JOIN_TIMEOUT: Duration = Duration::from_secs(30);

/// A running store node.
pub struct Node {
    config: NodeConfig,
    engine: Arc<RaftEngine>,
    store: Arc<Store>,
    membership: Arc<MembershipManager>,
    mode: StartupMode,
    lifecycle: NodeLifecycle,
}

impl Node {
    /// Open the node's storage and engine without joining or bootstrapping.
    pub async fn open(config: NodeConfig) -> StoreResult<Self> {
        config.validate().map_err(StoreError::Config)?;
        fs::create_dir_all(&config.data_dir)?;

        let peers = bootstrap::read_peers(&config.data_dir)?;
        let mode = bootstrap::plan_startup(config.join_addr.as_deref(), &peers);
        tracing::info!(
            data_dir = %config.data_dir.display(),
            peers = peers.len(),
            mode = ?mode,
            "opening node"
        );

        let map = Arc::new(KeyValueMap::new());
        let engine = Arc::new(RaftEngine::open(&config, KvStateMachine::new(map.clone())).await?);

        let consensus: Arc<dyn ConsensusEngine> = engine.clone();
        let store = Arc::new(
            Store::new(Arc::clone(&consensus), map).with_apply_timeout(config.apply_timeout()),
        );
        let membership = Arc::new(MembershipManager::new(consensus, config.join_policy));

        let lifecycle = NodeLifecycle::Unopened
            .advance(NodeLifecycle::Opened {
                singleton: mode == StartupMode::Singleton,
            })
            .unwrap_or(NodeLifecycle::Unopened);

        Ok(Self {
            config,
            engine,
            store,
            membership,
            mode,
            lifecycle,
        })
    }

    /// Open the node and bring it into its cluster.
    ///
    /// A singleton bootstraps itself; a joining node asks its join target to
    /// admit it; a resuming node relies on its persisted state.
    pub async fn start(config: NodeConfig) -> StoreResult<Self> {
        let mut node = Self::open(config).await?;

        match node.mode.clone() {
            StartupMode::Singleton => {
                node.engine.bootstrap_singleton().await?;
            }
            StartupMode::Join { target } => {
                node.transition(NodeLifecycle::AwaitingJoinAck)?;
                bootstrap::request_join(&target, &node.config.raft_addr, JOIN_TIMEOUT).await?;
                tracing::info!(%target, "joined cluster");
            }
            StartupMode::Resume => {
                tracing::info!("resuming with persisted cluster state");
            }
        }

        node.transition(NodeLifecycle::Running)?;
        Ok(node)
    }

    fn transition(&mut self, to: NodeLifecycle) -> StoreResult<()> {
        self.lifecycle = self.lifecycle.advance(to).ok_or_else(|| {
            StoreError::Engine(format!(
                "invalid lifecycle transition {:?} -> {:?}",
                self.lifecycle, to
            ))
        })?;
        Ok(())
    }

    /// The node's configuration.
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// The startup mode chosen for this node.
    pub fn mode(&self) -> &StartupMode {
        &self.mode
    }

    /// Where the node is in its startup sequence.
    pub fn lifecycle(&self) -> NodeLifecycle {
        self.lifecycle
    }

    /// The key-value store.
    pub fn store(&self) -> Arc<Store> {
        Arc::clone(&self.store)
    }

    /// The membership manager.
    pub fn membership(&self) -> Arc<MembershipManager> {
        Arc::clone(&self.membership)
    }

    /// The Raft engine.
    pub fn engine(&self) -> &Arc<RaftEngine> {
        &self.engine
    }

    /// Current role of this node.
    pub fn role(&self) -> NodeRole {
        self.engine.current_role()
    }

    /// Wait until this node observes `role`, up to `timeout`.
    pub async fn wait_for_role(&self, role: NodeRole, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.role() == role {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.role() == role
    }

    /// Stop the engine.
    pub async fn shutdown(&self) -> StoreResult<()> {
        self.engine.shutdown().await
    }
}

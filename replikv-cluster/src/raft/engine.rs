//! RaftEngine - the OpenRaft instance behind the store.

use crate::bootstrap::write_peers;
use crate::command::EncodedCommand;
use crate::config::NodeConfig;
use crate::engine::{ConsensusEngine, NodeRole};
use crate::error::{ClientWriteError, InitializeError, RaftError, StoreError, StoreResult};
use crate::network::{NetworkClient, RaftServer};
use crate::raft::log_store::LogStore;
use crate::raft::snapshot_store::SnapshotStore;
use crate::state::{ApplyResult, KvStateMachine, StateMachineStore};
use crate::types::{NodeId, StoreMetrics, StoreRaft, node_id_for};
use async_trait::async_trait;
use openraft::{BasicNode, ChangeMembers, Config, Raft, SnapshotPolicy};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// The OpenRaft-backed consensus engine.
///
/// Owns the Raft instance, its storage, the Raft RPC listener, and a task that
/// keeps `peers.json` in step with the committed voter set.
pub struct RaftEngine {
    /// This node's ID.
    node_id: NodeId,
    /// This node's Raft address.
    raft_addr: String,
    /// The Raft instance.
    raft: Arc<StoreRaft>,
    /// The state machine handed to Raft.
    state_machine: Arc<StateMachineStore>,
    /// Stops the Raft RPC listener.
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    /// Peer list writer.
    peers_task: Mutex<Option<JoinHandle<()>>>,
}

impl RaftEngine {
    /// Open storage, start Raft and begin serving Raft RPCs.
    pub async fn open(config: &NodeConfig, machine: KvStateMachine) -> StoreResult<Self> {
        config.validate().map_err(StoreError::Config)?;

        let node_id = node_id_for(&config.raft_addr);

        let log_store = LogStore::open(config.data_dir.join("raft"))?;
        let snapshots =
            SnapshotStore::open(config.data_dir.join("snapshots"), config.snapshot.retain)?;
        let state_machine = Arc::new(StateMachineStore::open(machine, snapshots)?);

        let raft_config = Config {
            cluster_name: "replikv".to_string(),
            election_timeout_min: config.raft.election_timeout_ms.0,
            election_timeout_max: config.raft.election_timeout_ms.1,
            heartbeat_interval: config.raft.heartbeat_interval_ms,
            max_payload_entries: config.raft.max_entries_per_append,
            snapshot_policy: SnapshotPolicy::LogsSinceLast(config.snapshot.snapshot_threshold),
            ..Default::default()
        };
        let raft_config = Arc::new(
            raft_config
                .validate()
                .map_err(|e| StoreError::Config(e.to_string()))?,
        );

        let bind_addr = config.raft_bind_addr().map_err(StoreError::Config)?;
        let listener = TcpListener::bind(bind_addr).await?;

        let raft = Raft::new(
            node_id,
            raft_config,
            NetworkClient::new(),
            log_store,
            Arc::clone(&state_machine),
        )
        .await
        .map_err(|e| StoreError::Engine(format!("failed to create raft: {e}")))?;
        let raft = Arc::new(raft);

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let server = RaftServer::new(Arc::clone(&raft));
        tokio::spawn(server.serve(listener, shutdown_rx));

        let peers_task = spawn_peers_writer(Arc::clone(&raft), config.data_dir.clone());

        tracing::info!(
            node_id,
            raft_addr = %config.raft_addr,
            last_applied = ?state_machine.last_applied(),
            "raft engine started"
        );

        Ok(Self {
            node_id,
            raft_addr: config.raft_addr.clone(),
            raft,
            state_machine,
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            peers_task: Mutex::new(Some(peers_task)),
        })
    }

    /// Bootstrap a new cluster with this node as its only voter.
    ///
    /// A node that already has cluster state is left alone.
    pub async fn bootstrap_singleton(&self) -> StoreResult<()> {
        let mut members = BTreeMap::new();
        members.insert(
            self.node_id,
            BasicNode {
                addr: self.raft_addr.clone(),
            },
        );

        match self.raft.initialize(members).await {
            Ok(()) => {
                tracing::info!(node_id = self.node_id, "bootstrapped single-node cluster");
                Ok(())
            }
            Err(RaftError::APIError(InitializeError::NotAllowed(_))) => {
                tracing::info!(node_id = self.node_id, "cluster state exists, not bootstrapping");
                Ok(())
            }
            Err(e) => Err(StoreError::Engine(format!("bootstrap failed: {e}"))),
        }
    }

    /// This node's ID.
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// The Raft instance.
    pub fn raft(&self) -> &Arc<StoreRaft> {
        &self.raft
    }

    /// The state machine handed to Raft.
    pub fn state_machine(&self) -> &Arc<StateMachineStore> {
        &self.state_machine
    }

    /// Get cluster metrics.
    pub fn metrics(&self) -> StoreMetrics {
        self.raft.metrics().borrow().clone()
    }

    /// Build a snapshot now.
    pub async fn trigger_snapshot(&self) -> StoreResult<()> {
        self.raft
            .trigger()
            .snapshot()
            .await
            .map_err(|e| StoreError::Engine(e.to_string()))
    }

    /// Stop Raft and the RPC listener.
    pub async fn shutdown(&self) -> StoreResult<()> {
        if let Some(tx) = self.shutdown_tx.lock().take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.peers_task.lock().take() {
            task.abort();
        }

        self.raft
            .shutdown()
            .await
            .map_err(|e| StoreError::Engine(format!("shutdown error: {e}")))?;

        tracing::info!(node_id = self.node_id, "raft engine shut down");
        Ok(())
    }

    fn addr_of(metrics: &StoreMetrics, id: NodeId) -> Option<String> {
        metrics
            .membership_config
            .nodes()
            .find(|(node_id, _)| **node_id == id)
            .map(|(_, node)| node.addr.clone())
    }

    fn leader_hint(&self) -> Option<String> {
        let metrics = self.raft.metrics().borrow().clone();
        metrics
            .current_leader
            .and_then(|leader| Self::addr_of(&metrics, leader))
    }
}

impl Drop for RaftEngine {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.get_mut().take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.peers_task.get_mut().take() {
            task.abort();
        }
    }
}

#[async_trait]
impl ConsensusEngine for RaftEngine {
    async fn apply(
        &self,
        command: EncodedCommand,
        timeout: Duration,
    ) -> StoreResult<ApplyResult> {
        match tokio::time::timeout(timeout, self.raft.client_write(command)).await {
            Err(_) => Err(StoreError::ApplyTimeout(timeout)),
            Ok(Ok(response)) => Ok(response.data),
            Ok(Err(RaftError::APIError(ClientWriteError::ForwardToLeader(forward)))) => {
                Err(StoreError::ApplyFailed(format!(
                    "leadership lost before commit (leader: {:?})",
                    forward.leader_node.map(|n| n.addr)
                )))
            }
            Ok(Err(e)) => Err(StoreError::ApplyFailed(e.to_string())),
        }
    }

    fn current_role(&self) -> NodeRole {
        self.raft.metrics().borrow().state.into()
    }

    fn leader_addr(&self) -> Option<String> {
        self.leader_hint()
    }

    fn voters(&self) -> Vec<String> {
        voter_addrs(&self.raft.metrics().borrow())
    }

    async fn add_voter(&self, addr: &str) -> StoreResult<()> {
        let id = node_id_for(addr);

        let already_voter = self
            .raft
            .metrics()
            .borrow()
            .membership_config
            .voter_ids()
            .any(|v| v == id);
        if already_voter {
            return Ok(());
        }

        let node = BasicNode {
            addr: addr.to_string(),
        };
        self.raft
            .add_learner(id, node, true)
            .await
            .map_err(|e| self.membership_error(e))?;
        tracing::info!(node_id = id, peer = %addr, "added learner");

        self.raft
            .change_membership(ChangeMembers::AddVoterIds(BTreeSet::from([id])), false)
            .await
            .map_err(|e| self.membership_error(e))?;
        tracing::info!(node_id = id, peer = %addr, "promoted learner to voter");

        Ok(())
    }
}

impl RaftEngine {
    fn membership_error(&self, e: RaftError<ClientWriteError>) -> StoreError {
        match e {
            RaftError::APIError(ClientWriteError::ForwardToLeader(_)) => StoreError::NotLeader {
                leader: self.leader_hint(),
            },
            other => StoreError::Membership(other.to_string()),
        }
    }
}

/// Sorted Raft addresses of the voters in `metrics`.
fn voter_addrs(metrics: &StoreMetrics) -> Vec<String> {
    let voters: BTreeSet<NodeId> = metrics.membership_config.voter_ids().collect();
    let mut addrs: Vec<String> = metrics
        .membership_config
        .nodes()
        .filter(|(id, _)| voters.contains(*id))
        .map(|(_, node)| node.addr.clone())
        .collect();
    addrs.sort();
    addrs
}

/// Rewrite `peers.json` whenever the voter set changes.
fn spawn_peers_writer(raft: Arc<StoreRaft>, data_dir: PathBuf) -> JoinHandle<()> {
    let mut metrics = raft.metrics();
    drop(raft);

    tokio::spawn(async move {
        let mut written: Option<Vec<String>> = None;
        loop {
            let voters = voter_addrs(&metrics.borrow_and_update());
            if !voters.is_empty() && written.as_ref() != Some(&voters) {
                match write_peers(&data_dir, &voters) {
                    Ok(()) => {
                        tracing::info!(peers = ?voters, "updated peer list");
                        written = Some(voters);
                    }
                    Err(e) => tracing::error!(error = %e, "failed to write peer list"),
                }
            }

            if metrics.changed().await.is_err() {
                break;
            }
        }
    })
}

//! Network client implementing OpenRaft's RaftNetwork trait over HTTP.

use crate::error::{RPCError, RaftError};
use crate::types::{NodeId, TypeConfig};
use openraft::BasicNode;
use openraft::error::{InstallSnapshotError, NetworkError, RemoteError, Unreachable};
use openraft::network::{RPCOption, RaftNetwork, RaftNetworkFactory};
use openraft::raft::{
    AppendEntriesRequest, AppendEntriesResponse, InstallSnapshotRequest, InstallSnapshotResponse,
    VoteRequest, VoteResponse,
};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Path of the AppendEntries endpoint.
pub const APPEND_PATH: &str = "/raft/append";
/// Path of the Vote endpoint.
pub const VOTE_PATH: &str = "/raft/vote";
/// Path of the InstallSnapshot endpoint.
pub const SNAPSHOT_PATH: &str = "/raft/snapshot";

/// Factory for creating network connections to other nodes.
///
/// All connections share one pooled HTTP client.
#[derive(Clone, Default)]
pub struct NetworkClient {
    http: reqwest::Client,
}

impl NetworkClient {
    /// Create a new network client.
    pub fn new() -> Self {
        Self::default()
    }
}

impl RaftNetworkFactory<TypeConfig> for NetworkClient {
    type Network = NetworkConnection;

    async fn new_client(&mut self, target: NodeId, node: &BasicNode) -> Self::Network {
        NetworkConnection {
            target,
            addr: node.addr.clone(),
            http: self.http.clone(),
        }
    }
}

/// A connection to a specific node.
pub struct NetworkConnection {
    /// Target node ID.
    target: NodeId,
    /// Target Raft address.
    addr: String,
    http: reqwest::Client,
}

impl NetworkConnection {
    /// POST `req` to `path` on the target and decode the remote result.
    async fn send_rpc<Req, Resp, E>(
        &self,
        path: &str,
        req: &Req,
        option: &RPCOption,
    ) -> Result<Resp, RPCError<E>>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
        E: std::error::Error + DeserializeOwned,
    {
        let url = format!("http://{}{}", self.addr, path);

        let response = self
            .http
            .post(&url)
            .timeout(option.hard_ttl())
            .json(req)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    openraft::error::RPCError::Unreachable(Unreachable::new(&e))
                } else {
                    openraft::error::RPCError::Network(NetworkError::new(&e))
                }
            })?;

        let result: Result<Resp, RaftError<E>> = response
            .json()
            .await
            .map_err(|e| openraft::error::RPCError::Network(NetworkError::new(&e)))?;

        result.map_err(|e| openraft::error::RPCError::RemoteError(RemoteError::new(self.target, e)))
    }
}

impl RaftNetwork<TypeConfig> for NetworkConnection {
    async fn append_entries(
        &mut self,
        req: AppendEntriesRequest<TypeConfig>,
        option: RPCOption,
    ) -> Result<AppendEntriesResponse<NodeId>, RPCError> {
        self.send_rpc(APPEND_PATH, &req, &option).await
    }

    async fn install_snapshot(
        &mut self,
        req: InstallSnapshotRequest<TypeConfig>,
        option: RPCOption,
    ) -> Result<InstallSnapshotResponse<NodeId>, RPCError<InstallSnapshotError>> {
        self.send_rpc(SNAPSHOT_PATH, &req, &option).await
    }

    async fn vote(
        &mut self,
        req: VoteRequest<NodeId>,
        option: RPCOption,
    ) -> Result<VoteResponse<NodeId>, RPCError> {
        self.send_rpc(VOTE_PATH, &req, &option).await
    }
}

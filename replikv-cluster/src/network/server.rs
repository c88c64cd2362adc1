//! HTTP server for handling Raft RPC requests.

use super::client::{APPEND_PATH, SNAPSHOT_PATH, VOTE_PATH};
use crate::types::{NodeId, StoreRaft, TypeConfig};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use openraft::raft::{AppendEntriesRequest, InstallSnapshotRequest, VoteRequest};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Serves Raft RPCs from peers.
pub struct RaftServer {
    /// Reference to the Raft instance.
    raft: Arc<StoreRaft>,
}

impl RaftServer {
    /// Create a new Raft server.
    pub fn new(raft: Arc<StoreRaft>) -> Self {
        Self { raft }
    }

    /// Accept connections on `listener` until `shutdown` fires.
    pub async fn serve(self, listener: TcpListener, mut shutdown: oneshot::Receiver<()>) {
        let raft = self.raft;

        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, remote_addr) = match result {
                        Ok(conn) => conn,
                        Err(e) => {
                            tracing::warn!(error = %e, "raft listener accept failed");
                            continue;
                        }
                    };

                    let io = TokioIo::new(stream);
                    let raft = Arc::clone(&raft);

                    tokio::spawn(async move {
                        let service = service_fn(move |req| {
                            let raft = Arc::clone(&raft);
                            async move { handle(req, raft).await }
                        });

                        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                            if !e.is_incomplete_message() {
                                tracing::debug!(
                                    remote = %remote_addr,
                                    error = %e,
                                    "raft connection error"
                                );
                            }
                        }
                    });
                }
                _ = &mut shutdown => {
                    tracing::debug!("raft server shutting down");
                    break;
                }
            }
        }
    }
}

async fn handle(
    req: Request<Incoming>,
    raft: Arc<StoreRaft>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    if method != Method::POST {
        return Ok(plain(StatusCode::METHOD_NOT_ALLOWED, "method not allowed"));
    }

    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => return Ok(plain(StatusCode::BAD_REQUEST, &e.to_string())),
    };

    let response = match path.as_str() {
        APPEND_PATH => match decode::<AppendEntriesRequest<TypeConfig>>(&body) {
            Ok(rpc) => encode(&raft.append_entries(rpc).await),
            Err(r) => r,
        },
        VOTE_PATH => match decode::<VoteRequest<NodeId>>(&body) {
            Ok(rpc) => encode(&raft.vote(rpc).await),
            Err(r) => r,
        },
        SNAPSHOT_PATH => match decode::<InstallSnapshotRequest<TypeConfig>>(&body) {
            Ok(rpc) => encode(&raft.install_snapshot(rpc).await),
            Err(r) => r,
        },
        _ => plain(StatusCode::NOT_FOUND, "not found"),
    };

    Ok(response)
}

#[allow(clippy::result_large_err)]
fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, Response<Full<Bytes>>> {
    serde_json::from_slice(body).map_err(|e| plain(StatusCode::BAD_REQUEST, &e.to_string()))
}

/// Encode the engine's `Result` as-is; the caller decodes remote errors.
fn encode<T: Serialize>(result: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(result) {
        Ok(json) => build(StatusCode::OK, "application/json", Bytes::from(json)),
        Err(e) => plain(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

fn plain(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    build(status, "text/plain", Bytes::from(message.to_string()))
}

fn build(status: StatusCode, content_type: &str, body: Bytes) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    if let Ok(value) = content_type.parse() {
        response
            .headers_mut()
            .insert(hyper::header::CONTENT_TYPE, value);
    }
    response
}

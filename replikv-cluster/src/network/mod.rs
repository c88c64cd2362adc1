//! Network layer for Raft RPC communication.
//!
//! Raft messages travel as JSON over plain HTTP/1.1: a reqwest client on the
//! sending side and a hyper server bound on the node's Raft address.

mod client;
mod server;

pub use client::{APPEND_PATH, NetworkClient, SNAPSHOT_PATH, VOTE_PATH};
pub use server::RaftServer;

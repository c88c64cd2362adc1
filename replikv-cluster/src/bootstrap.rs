//! Startup decisions: singleton, join or resume.
//!
//! A node persists the addresses of the current voters in `peers.json` in its
//! data directory. At startup that list, together with the `--join` target,
//! decides how the node comes up:
//!
//! | join target | persisted peers | mode      |
//! |-------------|-----------------|-----------|
//! | none        | fewer than two  | Singleton |
//! | some        | any             | Join      |
//! | none        | two or more     | Resume    |

use crate::error::{StoreError, StoreResult};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

/// File holding the persisted voter addresses.
pub const PEERS_FILE: &str = "peers.json";

/// How a node comes up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupMode {
    /// Bootstrap a new cluster with this node as its only voter.
    Singleton,
    /// Ask the member at `target` (HTTP address) to add this node.
    Join {
        /// HTTP address of an existing member.
        target: String,
    },
    /// Rejoin the cluster recorded in the persisted log.
    Resume,
}

/// Where a node is in its startup sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeLifecycle {
    /// Nothing opened yet.
    Unopened,
    /// Engine, storage and Raft listener are open.
    Opened {
        /// Whether the node bootstraps alone.
        singleton: bool,
    },
    /// Join request sent, waiting for the member to answer.
    AwaitingJoinAck,
    /// Serving.
    Running,
}

impl NodeLifecycle {
    /// Advance to the next state. Returns `None` for transitions the startup
    /// sequence never makes.
    pub fn advance(self, to: NodeLifecycle) -> Option<NodeLifecycle> {
        use NodeLifecycle::*;
        match (self, to) {
            (Unopened, Opened { .. })
            | (Opened { singleton: true }, Running)
            | (Opened { singleton: false }, AwaitingJoinAck)
            | (Opened { singleton: false }, Running)
            | (AwaitingJoinAck, Running) => Some(to),
            _ => None,
        }
    }
}

/// Read the persisted peer list. A missing file is an empty list.
pub fn read_peers(data_dir: &Path) -> StoreResult<Vec<String>> {
    let path = data_dir.join(PEERS_FILE);
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(&path)?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| {
        StoreError::Config(format!("cannot read {}: {e}", path.display()))
    })
}

/// Atomically replace the persisted peer list.
pub fn write_peers(data_dir: &Path, peers: &[String]) -> StoreResult<()> {
    let path = data_dir.join(PEERS_FILE);
    let temp_path = data_dir.join(format!("{PEERS_FILE}.tmp"));

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&temp_path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, peers)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;

    fs::rename(&temp_path, &path)?;
    Ok(())
}

/// Decide the startup mode.
pub fn plan_startup(join_addr: Option<&str>, peers: &[String]) -> StartupMode {
    match join_addr {
        Some(target) => StartupMode::Join {
            target: target.to_string(),
        },
        None if peers.len() < 2 => StartupMode::Singleton,
        None => StartupMode::Resume,
    }
}

#[derive(Serialize)]
struct JoinRequest<'a> {
    addr: &'a str,
}

/// Ask the member at `target` (HTTP address) to add `raft_addr` as a voter.
pub async fn request_join(target: &str, raft_addr: &str, timeout: Duration) -> StoreResult<()> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| StoreError::Membership(e.to_string()))?;

    let url = format!("http://{target}/join");
    tracing::info!(%url, %raft_addr, "requesting to join cluster");

    let response = client
        .post(&url)
        .json(&JoinRequest { addr: raft_addr })
        .send()
        .await
        .map_err(|e| StoreError::Membership(format!("join request to {target} failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(StoreError::Membership(format!(
            "join request to {target} returned {status}: {body}"
        )));
    }

    Ok(())
}

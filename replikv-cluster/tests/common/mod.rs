//! Common test utilities for replikv-cluster tests.

use replikv_cluster::{Node, NodeConfig, NodeRole};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Atomic counter for allocating unique ports.
static PORT_COUNTER: AtomicU16 = AtomicU16::new(17000);

/// Get a unique port for testing.
pub fn get_test_port() -> u16 {
    PORT_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Configuration for a test node using fresh ports.
pub fn test_config(data_dir: &TempDir) -> NodeConfig {
    NodeConfig::builder()
        .http_addr(format!("127.0.0.1:{}", get_test_port()))
        .raft_addr(format!("127.0.0.1:{}", get_test_port()))
        .data_dir(data_dir.path())
        .apply_timeout(Duration::from_secs(5))
        .build()
        .expect("Invalid config")
}

/// Wait for `node` to become leader.
#[allow(dead_code)]
pub async fn wait_for_leader(node: &Node) {
    assert!(
        node.wait_for_role(NodeRole::Leader, Duration::from_secs(5))
            .await,
        "node did not become leader"
    );
}

/// Poll `cond` until it holds or `timeout_ms` elapses.
#[allow(dead_code)]
pub async fn wait_until(timeout_ms: u64, mut cond: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    let timeout = Duration::from_millis(timeout_ms);

    while start.elapsed() < timeout {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    cond()
}

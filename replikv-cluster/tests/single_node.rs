//! Single-node cluster tests.

mod common;

use common::{test_config, wait_for_leader};
use replikv_cluster::bootstrap::read_peers;
use replikv_cluster::{Node, NodeLifecycle, NodeRole, StartupMode};
use tempfile::TempDir;

/// A fresh node with no join target bootstraps itself and serves writes.
#[tokio::test]
async fn test_single_node_set_get_delete() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let node = Node::start(test_config(&temp_dir))
        .await
        .expect("Failed to start node");

    assert_eq!(node.mode(), &StartupMode::Singleton);
    assert_eq!(node.lifecycle(), NodeLifecycle::Running);
    wait_for_leader(&node).await;

    let store = node.store();
    store.set("user1", "batman").await.expect("set");
    assert_eq!(store.get("user1").as_deref(), Some("batman"));

    store.set("user1", "robin").await.expect("overwrite");
    assert_eq!(store.get("user1").as_deref(), Some("robin"));

    store.delete("user1").await.expect("delete");
    assert_eq!(store.get("user1"), None);

    node.shutdown().await.expect("shutdown");
}

/// The voter list is persisted once the node leads.
#[tokio::test]
async fn test_single_node_writes_peer_list() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let config = test_config(&temp_dir);
    let raft_addr = config.raft_addr.clone();
    let node = Node::start(config).await.expect("Failed to start node");
    wait_for_leader(&node).await;

    let written = common::wait_until(2000, || {
        read_peers(temp_dir.path()).is_ok_and(|p| p == vec![raft_addr.clone()])
    })
    .await;
    assert!(written, "peers.json should list the single voter");

    node.shutdown().await.expect("shutdown");
}

/// Restarting on the same data directory replays the log.
#[tokio::test]
async fn test_single_node_restart_keeps_state() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let config = test_config(&temp_dir);

    {
        let node = Node::start(config.clone()).await.expect("start");
        wait_for_leader(&node).await;
        node.store().set("a", "1").await.expect("set a");
        node.store().set("b", "2").await.expect("set b");
        node.store().delete("a").await.expect("delete a");
        node.shutdown().await.expect("shutdown");
    }
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    let node = Node::start(config).await.expect("restart");
    wait_for_leader(&node).await;

    let store = node.store();
    let restored = common::wait_until(3000, || store.get("b").as_deref() == Some("2")).await;
    assert!(restored, "log should be replayed on restart");
    assert_eq!(store.get("a"), None);
    assert_eq!(node.role(), NodeRole::Leader);

    node.shutdown().await.expect("shutdown");
}

/// A snapshot is persisted and restored on restart.
#[tokio::test]
async fn test_single_node_snapshot_restore() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let config = test_config(&temp_dir);

    {
        let node = Node::start(config.clone()).await.expect("start");
        wait_for_leader(&node).await;
        for i in 0..20 {
            node.store()
                .set(format!("key{i}"), format!("value{i}"))
                .await
                .expect("set");
        }
        node.engine().trigger_snapshot().await.expect("trigger");

        let snapshot_dir = temp_dir.path().join("snapshots");
        let persisted = common::wait_until(3000, || {
            std::fs::read_dir(&snapshot_dir)
                .map(|entries| {
                    entries
                        .filter_map(Result::ok)
                        .any(|e| !e.file_name().to_string_lossy().ends_with(".tmp"))
                })
                .unwrap_or(false)
        })
        .await;
        assert!(persisted, "snapshot should be written to disk");
        node.shutdown().await.expect("shutdown");
    }
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    let node = Node::start(config).await.expect("restart");
    let store = node.store();
    assert_eq!(store.get("key7").as_deref(), Some("value7"));
    assert!(node.engine().state_machine().last_applied().is_some());

    node.shutdown().await.expect("shutdown");
}

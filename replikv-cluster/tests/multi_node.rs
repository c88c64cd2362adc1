//! Multi-node cluster tests.
//!
//! The second node is opened without bootstrapping and admitted through the
//! leader's membership manager, the same path a `/join` request takes.

mod common;

use common::{test_config, wait_for_leader, wait_until};
use replikv_cluster::bootstrap::read_peers;
use replikv_cluster::{Node, NodeRole, StoreError};
use tempfile::TempDir;

struct TwoNodes {
    _dirs: (TempDir, TempDir),
    leader: Node,
    follower: Node,
}

async fn two_node_cluster() -> TwoNodes {
    let leader_dir = TempDir::new().expect("create temp dir");
    let follower_dir = TempDir::new().expect("create temp dir");

    let leader = Node::start(test_config(&leader_dir))
        .await
        .expect("Failed to start leader");
    wait_for_leader(&leader).await;

    let follower = Node::open(test_config(&follower_dir))
        .await
        .expect("Failed to open follower");

    leader
        .membership()
        .join(&follower.config().raft_addr)
        .await
        .expect("join");

    TwoNodes {
        _dirs: (leader_dir, follower_dir),
        leader,
        follower,
    }
}

/// Writes on the leader replicate to a joined follower.
#[tokio::test]
async fn test_join_and_replicate() {
    let cluster = two_node_cluster().await;

    cluster
        .leader
        .store()
        .set("user1", "batman")
        .await
        .expect("set");

    let follower_store = cluster.follower.store();
    let replicated = wait_until(3000, || {
        follower_store.get("user1").as_deref() == Some("batman")
    })
    .await;
    assert!(replicated, "follower should apply the write");

    let mut expected = vec![
        cluster.leader.config().raft_addr.clone(),
        cluster.follower.config().raft_addr.clone(),
    ];
    expected.sort();
    assert_eq!(cluster.leader.membership().voters(), expected);

    let follower_sees_both = wait_until(3000, || cluster.follower.membership().voters() == expected).await;
    assert!(follower_sees_both, "follower should see both voters");

    let follower_dir = cluster.follower.config().data_dir.clone();
    let persisted = wait_until(3000, || {
        read_peers(&follower_dir).is_ok_and(|p| p == expected)
    })
    .await;
    assert!(persisted, "follower should persist the peer list");

    cluster.follower.shutdown().await.expect("shutdown");
    cluster.leader.shutdown().await.expect("shutdown");
}

/// Joining the same address twice leaves membership unchanged.
#[tokio::test]
async fn test_join_is_idempotent() {
    let cluster = two_node_cluster().await;
    let before = cluster.leader.membership().voters();

    cluster
        .leader
        .membership()
        .join(&cluster.follower.config().raft_addr)
        .await
        .expect("second join");

    assert_eq!(cluster.leader.membership().voters(), before);
    assert_eq!(before.len(), 2);

    cluster.follower.shutdown().await.expect("shutdown");
    cluster.leader.shutdown().await.expect("shutdown");
}

/// A follower refuses writes immediately and keeps its map unchanged.
#[tokio::test]
async fn test_follower_rejects_writes() {
    let cluster = two_node_cluster().await;

    cluster.leader.store().set("k", "v").await.expect("set");
    let follower_store = cluster.follower.store();
    assert!(wait_until(3000, || follower_store.get("k").is_some()).await);

    assert_ne!(cluster.follower.role(), NodeRole::Leader);
    let err = follower_store.set("x", "1").await.unwrap_err();
    match err {
        StoreError::NotLeader { leader } => {
            assert_eq!(leader.as_deref(), Some(cluster.leader.config().raft_addr.as_str()));
        }
        other => panic!("expected NotLeader, got {other:?}"),
    }
    assert!(follower_store.delete("k").await.unwrap_err().is_not_leader());

    assert_eq!(follower_store.get("x"), None);
    assert_eq!(follower_store.get("k").as_deref(), Some("v"));

    cluster.follower.shutdown().await.expect("shutdown");
    cluster.leader.shutdown().await.expect("shutdown");
}

/// A node joining after the leader purged its log catches up from the
/// snapshot and then from the remaining log.
#[tokio::test]
async fn test_join_after_log_purge_installs_snapshot() {
    let leader_dir = TempDir::new().expect("create temp dir");
    let follower_dir = TempDir::new().expect("create temp dir");

    let leader = Node::start(test_config(&leader_dir))
        .await
        .expect("Failed to start leader");
    wait_for_leader(&leader).await;

    let store = leader.store();
    for i in 0..1100 {
        store
            .set(format!("key{i}"), format!("value{i}"))
            .await
            .expect("set");
    }

    let engine = leader.engine();
    engine.trigger_snapshot().await.expect("trigger snapshot");
    assert!(
        wait_until(5000, || engine.metrics().snapshot.is_some()).await,
        "leader should build a snapshot"
    );
    let snapshot_index = engine
        .metrics()
        .snapshot
        .map(|log_id| log_id.index)
        .expect("snapshot log id");

    engine
        .raft()
        .trigger()
        .purge_log(snapshot_index)
        .await
        .expect("trigger purge");
    assert!(
        wait_until(5000, || {
            engine
                .metrics()
                .purged
                .is_some_and(|log_id| log_id.index == snapshot_index)
        })
        .await,
        "leader should purge its log up to the snapshot"
    );

    // Written after the purge, so it reaches the follower as a log entry.
    store.set("late", "entry").await.expect("set");

    let follower = Node::open(test_config(&follower_dir))
        .await
        .expect("Failed to open follower");
    leader
        .membership()
        .join(&follower.config().raft_addr)
        .await
        .expect("join");

    let follower_store = follower.store();
    let caught_up = wait_until(10_000, || {
        follower_store.get("key0").as_deref() == Some("value0")
            && follower_store.get("key1099").as_deref() == Some("value1099")
            && follower_store.get("late").as_deref() == Some("entry")
    })
    .await;
    assert!(caught_up, "follower should serve early and late keys");

    let installed = follower.engine().metrics().snapshot;
    assert!(
        installed.is_some_and(|log_id| log_id.index >= snapshot_index),
        "follower should have installed the leader's snapshot, got {installed:?}"
    );
    assert_eq!(follower_store.get("key550").as_deref(), Some("value550"));

    follower.shutdown().await.expect("shutdown");
    leader.shutdown().await.expect("shutdown");
}

//! End-to-end tests over the client HTTP API.

use replikv::api::ApiServer;
use replikv_cluster::{Node, NodeConfig, NodeRole};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Raft ports for this test binary.
static PORT_COUNTER: AtomicU16 = AtomicU16::new(27000);

fn raft_addr() -> String {
    format!("127.0.0.1:{}", PORT_COUNTER.fetch_add(1, Ordering::SeqCst))
}

struct TestNode {
    node: Node,
    http_addr: SocketAddr,
    _shutdown: oneshot::Sender<()>,
    _dir: TempDir,
}

impl TestNode {
    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.http_addr, path)
    }
}

/// Start a node, joining `join` if given, and serve its API.
async fn start_node(join: Option<SocketAddr>) -> TestNode {
    let dir = TempDir::new().expect("create temp dir");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind http");
    let http_addr = listener.local_addr().expect("local addr");

    let mut builder = NodeConfig::builder()
        .http_addr(http_addr.to_string())
        .raft_addr(raft_addr())
        .data_dir(dir.path());
    if let Some(target) = join {
        builder = builder.join_addr(target.to_string());
    }
    let node = Node::start(builder.build().expect("config"))
        .await
        .expect("start node");

    let (tx, rx) = oneshot::channel();
    let server = ApiServer::new(node.store(), node.membership());
    tokio::spawn(server.serve(listener, rx));

    TestNode {
        node,
        http_addr,
        _shutdown: tx,
        _dir: dir,
    }
}

async fn eventually(timeout_ms: u64, mut cond: impl AsyncFnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < Duration::from_millis(timeout_ms) {
        if cond().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test]
async fn single_node_over_http() {
    let node = start_node(None).await;
    assert!(
        node.node
            .wait_for_role(NodeRole::Leader, Duration::from_secs(5))
            .await
    );
    let client = reqwest::Client::new();

    let pong = client.get(node.url("/ping")).send().await.unwrap();
    assert_eq!(pong.status(), 200);
    assert_eq!(pong.text().await.unwrap(), "pong");

    let set = client
        .post(node.url("/keys"))
        .body(r#"{"user1":"batman"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(set.status(), 200);

    let value: serde_json::Value = client
        .get(node.url("/keys/user1"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(value, serde_json::json!({"user1": "batman"}));

    let deleted = client.delete(node.url("/keys/user1")).send().await.unwrap();
    assert_eq!(deleted.status(), 200);

    let value: serde_json::Value = client
        .get(node.url("/keys/user1"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(value, serde_json::json!({"user1": ""}));

    let bad = client
        .post(node.url("/keys"))
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(bad.status(), 400);

    node.node.shutdown().await.unwrap();
}

#[tokio::test]
async fn second_node_joins_and_rejects_writes() {
    let leader = start_node(None).await;
    assert!(
        leader
            .node
            .wait_for_role(NodeRole::Leader, Duration::from_secs(5))
            .await
    );

    let follower = start_node(Some(leader.http_addr)).await;
    let client = reqwest::Client::new();

    let set = client
        .post(leader.url("/keys"))
        .body(r#"{"user1":"batman"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(set.status(), 200);

    let replicated = eventually(3000, async || {
        let value: serde_json::Value = match client.get(follower.url("/keys/user1")).send().await {
            Ok(response) => response.json().await.unwrap_or_default(),
            Err(_) => return false,
        };
        value["user1"] == "batman"
    })
    .await;
    assert!(replicated, "follower should serve the replicated value");
    assert_eq!(leader.node.membership().voters().len(), 2);

    let rejected = client
        .post(follower.url("/keys"))
        .body(r#"{"x":"1"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(rejected.status(), 500);
    let body: serde_json::Value = rejected.json().await.unwrap();
    assert_eq!(body["error"]["code"], "not_leader");
    assert_eq!(
        body["error"]["leader"],
        leader.node.config().raft_addr.as_str()
    );
    assert_eq!(follower.node.store().get("x"), None);

    // Joining again changes nothing.
    let rejoin = client
        .post(leader.url("/join"))
        .json(&serde_json::json!({"addr": follower.node.config().raft_addr}))
        .send()
        .await
        .unwrap();
    assert_eq!(rejoin.status(), 200);
    assert_eq!(leader.node.membership().voters().len(), 2);

    follower.node.shutdown().await.unwrap();
    leader.node.shutdown().await.unwrap();
}

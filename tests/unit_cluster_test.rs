// tests/unit_cluster_test.rs

//! Tests for the cluster router: local execution, routing policy, the
//! same-peer rename rule, and broadcast failure aggregation.

use bytes::Bytes;
use dashmap::DashMap;
use pyropedb::config::Config;
use pyropedb::connection::{ConnectionHandler, SessionState};
use pyropedb::core::cluster::{ClusterDatabase, HashRing};
use pyropedb::core::database::{Database, ExecutionEngine};
use pyropedb::core::storage::DataValue;
use pyropedb::core::RespValue;
use pyropedb::server::{ClientInfo, ServerState};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

const SELF_ADDR: &str = "10.0.0.1:6379";
const PEER_ADDR: &str = "10.0.0.2:6379";

fn cmd(parts: &[&str]) -> Vec<Bytes> {
    parts
        .iter()
        .map(|part| Bytes::copy_from_slice(part.as_bytes()))
        .collect()
}

fn cluster_config(self_addr: &str, peers: &[&str]) -> Config {
    Config {
        self_addr: Some(self_addr.to_string()),
        peers: peers.iter().map(|peer| peer.to_string()).collect(),
        ..Config::default()
    }
}

/// Probes key names until one lands on the wanted node of a two-node ring.
fn key_owned_by(ring: &HashRing, node: &str) -> String {
    for i in 0..10_000 {
        let key = format!("key-{i}");
        if ring.pick_node(key.as_bytes()) == Some(node) {
            return key;
        }
    }
    panic!("no probe key hashed to {node}");
}

fn two_node_ring() -> HashRing {
    let mut ring = HashRing::new(None);
    ring.add_nodes([PEER_ADDR, SELF_ADDR]);
    ring
}

#[tokio::test]
async fn test_single_node_cluster_executes_locally() {
    let config = cluster_config(SELF_ADDR, &[]);
    let cluster = ClusterDatabase::new(&config, Database::new(16)).unwrap();
    let mut session = SessionState::new();

    assert_eq!(
        cluster.exec(&mut session, &cmd(&["SET", "k", "v"])).await,
        RespValue::ok()
    );
    assert_eq!(
        cluster.exec(&mut session, &cmd(&["GET", "k"])).await,
        RespValue::BulkString(Bytes::from_static(b"v"))
    );
    assert_eq!(
        cluster.exec(&mut session, &cmd(&["DEL", "k", "x"])).await,
        RespValue::Integer(1)
    );
}

#[tokio::test]
async fn test_ping_is_replied_locally() {
    let config = cluster_config(SELF_ADDR, &["127.0.0.1:1"]);
    let cluster = ClusterDatabase::new(&config, Database::new(16)).unwrap();
    let mut session = SessionState::new();

    // A dead peer must not matter: PING never leaves this node.
    assert_eq!(
        cluster.exec(&mut session, &cmd(&["PING"])).await,
        RespValue::pong()
    );
}

#[tokio::test]
async fn test_select_updates_the_client_and_is_not_relayed() {
    let config = cluster_config(SELF_ADDR, &["127.0.0.1:1"]);
    let cluster = ClusterDatabase::new(&config, Database::new(16)).unwrap();
    let mut session = SessionState::new();

    assert_eq!(
        cluster.exec(&mut session, &cmd(&["SELECT", "7"])).await,
        RespValue::ok()
    );
    assert_eq!(session.current_db_index, 7);
}

#[tokio::test]
async fn test_commands_outside_the_routing_table_are_unknown() {
    let config = cluster_config(SELF_ADDR, &[]);
    let cluster = ClusterDatabase::new(&config, Database::new(16)).unwrap();
    let mut session = SessionState::new();

    assert_eq!(
        cluster.exec(&mut session, &cmd(&["KEYS", "*"])).await,
        RespValue::Error("ERR unknown command keys".into())
    );
}

#[tokio::test]
async fn test_rename_across_peers_is_rejected() {
    let ring = two_node_ring();
    let local_key = key_owned_by(&ring, SELF_ADDR);
    let remote_key = key_owned_by(&ring, PEER_ADDR);

    let config = cluster_config(SELF_ADDR, &[PEER_ADDR]);
    let cluster = ClusterDatabase::new(&config, Database::new(16)).unwrap();
    let mut session = SessionState::new();

    assert_eq!(
        cluster
            .exec(&mut session, &cmd(&["RENAME", local_key.as_str(), remote_key.as_str()]))
            .await,
        RespValue::Error("ERR rename must within one peer".into())
    );
}

#[tokio::test]
async fn test_rename_on_one_local_peer_runs_locally() {
    let ring = two_node_ring();
    let src = key_owned_by(&ring, SELF_ADDR);
    // A second local key distinct from the first.
    let dst = (0..10_000)
        .map(|i| format!("dst-{i}"))
        .find(|key| ring.pick_node(key.as_bytes()) == Some(SELF_ADDR) && *key != src)
        .unwrap();

    let config = cluster_config(SELF_ADDR, &[PEER_ADDR]);
    let cluster = ClusterDatabase::new(&config, Database::new(16)).unwrap();
    let mut session = SessionState::new();

    cluster.exec(&mut session, &cmd(&["SET", src.as_str(), "v"])).await;
    assert_eq!(
        cluster
            .exec(&mut session, &cmd(&["RENAME", src.as_str(), dst.as_str()]))
            .await,
        RespValue::ok()
    );
    assert_eq!(
        cluster.exec(&mut session, &cmd(&["GET", dst.as_str()])).await,
        RespValue::BulkString(Bytes::from_static(b"v"))
    );
}

/// Boots a real standalone node on an ephemeral port and returns its
/// address plus a handle on its keyspace.
async fn start_peer_node() -> (String, Arc<Database>, broadcast::Sender<()>) {
    let database = Arc::new(Database::new(16));
    let (shutdown_tx, _) = broadcast::channel(1);
    let state = Arc::new(ServerState {
        config: Config::default(),
        engine: database.clone(),
        clients: DashMap::new(),
        shutdown_tx: shutdown_tx.clone(),
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let accept_state = state.clone();
    tokio::spawn(async move {
        let mut session_id = 0u64;
        loop {
            let Ok((socket, peer_addr)) = listener.accept().await else {
                return;
            };
            session_id += 1;
            accept_state.clients.insert(
                session_id,
                ClientInfo {
                    addr: peer_addr,
                    created: std::time::Instant::now(),
                },
            );
            let handler = ConnectionHandler::new(
                accept_state.clone(),
                session_id,
                peer_addr,
                accept_state.shutdown_tx.subscribe(),
            );
            tokio::spawn(handler.run(socket));
        }
    });

    (addr, database, shutdown_tx)
}

#[tokio::test]
async fn test_relay_to_a_live_peer_round_trips() {
    let (peer_addr, peer_database, _peer_shutdown) = start_peer_node().await;

    let mut ring = HashRing::new(None);
    ring.add_nodes([peer_addr.as_str(), SELF_ADDR]);
    let remote_key = key_owned_by(&ring, peer_addr.as_str());

    let config = cluster_config(SELF_ADDR, &[peer_addr.as_str()]);
    let cluster = ClusterDatabase::new(&config, Database::new(16)).unwrap();
    let mut session = SessionState::new();

    assert_eq!(
        cluster
            .exec(&mut session, &cmd(&["SET", remote_key.as_str(), "v"]))
            .await,
        RespValue::ok()
    );
    assert_eq!(
        cluster
            .exec(&mut session, &cmd(&["GET", remote_key.as_str()]))
            .await,
        RespValue::BulkString(Bytes::from_static(b"v"))
    );

    // The value lives on the peer, not on this node.
    assert_eq!(
        peer_database.db(0).unwrap().data.get(remote_key.as_bytes()),
        Some(DataValue::Str(Bytes::from_static(b"v")))
    );
}

#[tokio::test]
async fn test_relay_synchronises_the_selected_sub_database() {
    let (peer_addr, peer_database, _peer_shutdown) = start_peer_node().await;

    let mut ring = HashRing::new(None);
    ring.add_nodes([peer_addr.as_str(), SELF_ADDR]);
    let remote_key = key_owned_by(&ring, peer_addr.as_str());

    let config = cluster_config(SELF_ADDR, &[peer_addr.as_str()]);
    let cluster = ClusterDatabase::new(&config, Database::new(16)).unwrap();
    let mut session = SessionState::new();

    cluster.exec(&mut session, &cmd(&["SELECT", "3"])).await;
    cluster
        .exec(&mut session, &cmd(&["SET", remote_key.as_str(), "v"]))
        .await;

    // The relayed SELECT put the write into the peer's sub-database 3.
    assert_eq!(peer_database.db(0).unwrap().data.get(remote_key.as_bytes()), None);
    assert_eq!(
        peer_database.db(3).unwrap().data.get(remote_key.as_bytes()),
        Some(DataValue::Str(Bytes::from_static(b"v")))
    );
}

#[tokio::test]
async fn test_del_with_a_down_peer_is_a_generic_error() {
    // DEL broadcasts to every node; port 1 refuses connections, so the
    // borrow fails and no partial integer reply may escape.
    let config = cluster_config(SELF_ADDR, &["127.0.0.1:1"]);
    let cluster = ClusterDatabase::new(&config, Database::new(16)).unwrap();
    let mut session = SessionState::new();

    cluster.exec(&mut session, &cmd(&["SET", "k1", "v"])).await;
    let reply = cluster.exec(&mut session, &cmd(&["DEL", "k1", "k2"])).await;
    let RespValue::Error(message) = reply else {
        panic!("expected a generic error frame, got {reply:?}");
    };
    assert!(message.starts_with("error: "), "unexpected error: {message}");
}

#[tokio::test]
async fn test_flushdb_fails_when_any_peer_is_down() {
    let config = cluster_config(SELF_ADDR, &["127.0.0.1:1"]);
    let cluster = ClusterDatabase::new(&config, Database::new(16)).unwrap();
    let mut session = SessionState::new();

    let reply = cluster.exec(&mut session, &cmd(&["FLUSHDB"])).await;
    assert!(reply.is_error());
}

#[tokio::test]
async fn test_flushdb_succeeds_on_a_single_node_cluster() {
    let config = cluster_config(SELF_ADDR, &[]);
    let cluster = ClusterDatabase::new(&config, Database::new(16)).unwrap();
    let mut session = SessionState::new();

    cluster.exec(&mut session, &cmd(&["SET", "k", "v"])).await;
    assert_eq!(
        cluster.exec(&mut session, &cmd(&["FLUSHDB"])).await,
        RespValue::ok()
    );
    assert_eq!(
        cluster.exec(&mut session, &cmd(&["GET", "k"])).await,
        RespValue::null()
    );
}

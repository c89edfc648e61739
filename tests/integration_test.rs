// tests/integration_test.rs

//! End-to-end scenarios with literal wire bytes, driving a full connection
//! handler over an in-memory duplex stream.

use dashmap::DashMap;
use pyropedb::config::Config;
use pyropedb::connection::ConnectionHandler;
use pyropedb::core::database::Database;
use pyropedb::server::ServerState;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::broadcast;

/// Boots a standalone engine behind a handler and returns the client side
/// of the wire.
fn start_server() -> DuplexStream {
    let (shutdown_tx, _) = broadcast::channel(1);
    let state = Arc::new(ServerState {
        config: Config::default(),
        engine: Arc::new(Database::new(16)),
        clients: DashMap::new(),
        shutdown_tx: shutdown_tx.clone(),
    });

    let (client_side, server_side) = tokio::io::duplex(64 * 1024);
    let handler = ConnectionHandler::new(
        state,
        1,
        "127.0.0.1:0".parse().unwrap(),
        shutdown_tx.subscribe(),
    );
    tokio::spawn(handler.run(server_side));
    client_side
}

/// Writes a request and reads exactly `expected.len()` reply bytes.
async fn exchange(client: &mut DuplexStream, request: &[u8], expected: &[u8]) {
    client.write_all(request).await.unwrap();
    let mut reply = vec![0u8; expected.len()];
    tokio::time::timeout(Duration::from_secs(5), client.read_exact(&mut reply))
        .await
        .expect("timed out waiting for reply")
        .unwrap();
    assert_eq!(
        String::from_utf8_lossy(&reply),
        String::from_utf8_lossy(expected)
    );
}

#[tokio::test]
async fn test_scenario_ping() {
    let mut client = start_server();
    exchange(&mut client, b"*1\r\n$4\r\nPING\r\n", b"+PONG\r\n").await;
}

#[tokio::test]
async fn test_scenario_set_then_get() {
    let mut client = start_server();
    exchange(
        &mut client,
        b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n",
        b"+OK\r\n",
    )
    .await;
    exchange(&mut client, b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n", b"$1\r\nv\r\n").await;
}

#[tokio::test]
async fn test_scenario_select_isolates_sub_databases() {
    let mut client = start_server();
    exchange(&mut client, b"*2\r\n$6\r\nSELECT\r\n$1\r\n1\r\n", b"+OK\r\n").await;
    exchange(
        &mut client,
        b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\na\r\n",
        b"+OK\r\n",
    )
    .await;
    exchange(&mut client, b"*2\r\n$6\r\nSELECT\r\n$1\r\n0\r\n", b"+OK\r\n").await;
    exchange(&mut client, b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n", b"$-1\r\n").await;
}

#[tokio::test]
async fn test_scenario_exists_on_empty_db() {
    let mut client = start_server();
    exchange(&mut client, b"*2\r\n$6\r\nEXISTS\r\n$1\r\nx\r\n", b":0\r\n").await;
}

#[tokio::test]
async fn test_scenario_rename_missing_key() {
    let mut client = start_server();
    exchange(
        &mut client,
        b"*3\r\n$6\r\nRENAME\r\n$1\r\na\r\n$1\r\nb\r\n",
        b"-no such key\r\n",
    )
    .await;
}

#[tokio::test]
async fn test_protocol_error_does_not_kill_the_connection() {
    let mut client = start_server();
    client.write_all(b"!bogus\r\n").await.unwrap();

    // The error reply arrives, then the connection keeps serving.
    let mut prefix = [0u8; 1];
    client.read_exact(&mut prefix).await.unwrap();
    assert_eq!(prefix[0], b'-');
    let mut reader = tokio::io::BufReader::new(&mut client);
    let mut line = String::new();
    tokio::io::AsyncBufReadExt::read_line(&mut reader, &mut line)
        .await
        .unwrap();
    assert!(line.starts_with("ERR Protocol error"));

    exchange(&mut client, b"*1\r\n$4\r\nPING\r\n", b"+PONG\r\n").await;
}

#[tokio::test]
async fn test_null_payload_is_silently_ignored() {
    let mut client = start_server();
    // A bare null bulk produces no reply at all; the next command is
    // served as if nothing happened.
    exchange(&mut client, b"$-1\r\n*1\r\n$4\r\nPING\r\n", b"+PONG\r\n").await;
}

#[tokio::test]
async fn test_unknown_command_replies_an_error() {
    let mut client = start_server();
    exchange(
        &mut client,
        b"*1\r\n$4\r\nFROB\r\n",
        b"-ERR unknown command frob\r\n",
    )
    .await;
}

#[tokio::test]
async fn test_pipelined_commands_reply_in_order() {
    let mut client = start_server();
    exchange(
        &mut client,
        b"*3\r\n$3\r\nSET\r\n$1\r\na\r\n$1\r\n1\r\n\
          *3\r\n$3\r\nSET\r\n$1\r\nb\r\n$1\r\n2\r\n\
          *3\r\n$3\r\nDEL\r\n$1\r\na\r\n$1\r\nb\r\n",
        b"+OK\r\n+OK\r\n:2\r\n",
    )
    .await;
}

#[tokio::test]
async fn test_binary_payload_round_trips_through_the_server() {
    let mut client = start_server();
    // Value contains CRLF and RESP type tags.
    exchange(
        &mut client,
        b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$8\r\n*\r\n$-1\r\n\r\n",
        b"+OK\r\n",
    )
    .await;
    exchange(
        &mut client,
        b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n",
        b"$8\r\n*\r\n$-1\r\n\r\n",
    )
    .await;
}

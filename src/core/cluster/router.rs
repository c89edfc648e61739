// src/core/cluster/router.rs

//! The cluster execution engine: resolves every command to a routing
//! policy and either executes locally, relays to the owning peer over a
//! pooled connection, or broadcasts to every node and aggregates.

use super::hash_ring::HashRing;
use super::pool::{build_pool, PeerPool, PooledClient};
use crate::config::Config;
use crate::connection::SessionState;
use crate::core::database::{Database, ExecutionEngine};
use crate::core::protocol::RespFrame;
use crate::core::{PyropeError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;
use deadpool::managed::Object;
use std::collections::HashMap;
use tracing::{debug, warn};

pub struct ClusterDatabase {
    self_addr: String,
    /// Every node in the cluster, peers first, self last.
    nodes: Vec<String>,
    ring: HashRing,
    /// One bounded connection pool per remote peer, keyed by address.
    peer_pools: HashMap<String, PeerPool>,
    local: Database,
}

impl ClusterDatabase {
    /// Builds the ring and one connection pool per peer from the static
    /// membership in the configuration.
    pub fn new(config: &Config, local: Database) -> Result<Self, PyropeError> {
        let self_addr = config
            .self_addr
            .clone()
            .ok_or_else(|| PyropeError::ClusterError("cluster mode requires 'self'".into()))?;

        let mut nodes: Vec<String> = Vec::with_capacity(config.peers.len() + 1);
        nodes.extend(config.peers.iter().cloned());
        nodes.push(self_addr.clone());

        let mut ring = HashRing::new(None);
        ring.add_nodes(&nodes);

        let mut peer_pools = HashMap::new();
        for peer in &config.peers {
            peer_pools.insert(peer.clone(), build_pool(peer)?);
        }

        Ok(Self {
            self_addr,
            nodes,
            ring,
            peer_pools,
            local,
        })
    }

    /// Executes `cmdline` on `peer`: locally when the peer is this node,
    /// otherwise over a pooled connection. Because the pool does not track
    /// remote DB state, a `SELECT` for the client's current sub-database
    /// is sent before every relayed command.
    async fn relay(
        &self,
        peer: &str,
        session: &mut SessionState,
        cmdline: &[Bytes],
    ) -> Result<RespValue, PyropeError> {
        if peer == self.self_addr {
            return Ok(self.local.exec(session, cmdline).await);
        }

        let pool = self
            .peer_pools
            .get(peer)
            .ok_or_else(|| PyropeError::ClusterError(format!("connection not found for {peer}")))?;
        let mut client: PooledClient = pool
            .get()
            .await
            .map_err(|e| PyropeError::ClusterError(format!("cannot reach peer {peer}: {e}")))?;

        let result = relay_on_client(&mut client, session.current_db_index, cmdline).await;
        match result {
            Ok(frame) => Ok(frame.into()),
            Err(e) => {
                // Broken mid-exchange: destroy instead of returning to the pool.
                let _ = Object::take(client);
                Err(e)
            }
        }
    }

    /// Relays `cmdline` to every node and returns the per-node replies;
    /// the caller decides how to aggregate.
    async fn broadcast(
        &self,
        session: &mut SessionState,
        cmdline: &[Bytes],
    ) -> Vec<(String, Result<RespValue, PyropeError>)> {
        let mut replies = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let reply = self.relay(node, session, cmdline).await;
            replies.push((node.clone(), reply));
        }
        replies
    }

    /// Single-key commands go to the key's owning node.
    async fn relay_by_key(&self, session: &mut SessionState, cmdline: &[Bytes]) -> RespValue {
        let Some(peer) = self.ring.pick_node(&cmdline[1]) else {
            return PyropeError::ClusterError("cluster ring is empty".into()).into();
        };
        debug!(
            "routing '{}' for key to {}",
            String::from_utf8_lossy(&cmdline[0]),
            peer
        );
        self.relay(peer, session, cmdline)
            .await
            .unwrap_or_else(Into::into)
    }

    /// RENAME and RENAMENX only work when both keys hash to the same peer.
    async fn exec_rename(&self, session: &mut SessionState, cmdline: &[Bytes]) -> RespValue {
        let src_peer = self.ring.pick_node(&cmdline[1]);
        let dst_peer = self.ring.pick_node(&cmdline[2]);
        if src_peer != dst_peer {
            return PyropeError::RenameAcrossPeers.into();
        }
        let Some(peer) = src_peer else {
            return PyropeError::ClusterError("cluster ring is empty".into()).into();
        };
        self.relay(peer, session, cmdline)
            .await
            .unwrap_or_else(Into::into)
    }

    /// FLUSHDB succeeds iff every node replies OK.
    async fn exec_flushdb(&self, session: &mut SessionState, cmdline: &[Bytes]) -> RespValue {
        for (node, reply) in self.broadcast(session, cmdline).await {
            match reply {
                Ok(RespValue::Error(msg)) => {
                    return PyropeError::Generic(format!("error: {msg}")).into();
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("flushdb failed on {}: {}", node, e);
                    return PyropeError::Generic(format!("error: {e}")).into();
                }
            }
        }
        RespValue::ok()
    }

    /// DEL sums the per-node deletion counts; any failing node fails the
    /// whole command with no partial integer reply.
    async fn exec_del(&self, session: &mut SessionState, cmdline: &[Bytes]) -> RespValue {
        let mut deleted: i64 = 0;
        for (node, reply) in self.broadcast(session, cmdline).await {
            match reply {
                Ok(RespValue::Integer(n)) => deleted += n,
                Ok(RespValue::Error(msg)) => {
                    return PyropeError::Generic(format!("error: {msg}")).into();
                }
                Ok(other) => {
                    warn!("unexpected del reply from {}: {:?}", node, other);
                    return PyropeError::Generic("error: unexpected del reply".into()).into();
                }
                Err(e) => {
                    warn!("del failed on {}: {}", node, e);
                    return PyropeError::Generic(format!("error: {e}")).into();
                }
            }
        }
        RespValue::Integer(deleted)
    }
}

#[async_trait]
impl ExecutionEngine for ClusterDatabase {
    async fn exec(&self, session: &mut SessionState, cmdline: &[Bytes]) -> RespValue {
        let Some(first) = cmdline.first() else {
            return PyropeError::ProtocolError("empty command".into()).into();
        };
        let name = String::from_utf8_lossy(first).to_ascii_lowercase();

        match name.as_str() {
            // Replied locally; SELECT updates the client's sub-database and
            // is never relayed.
            "ping" | "select" => self.local.exec(session, cmdline).await,

            "exists" | "type" | "get" | "set" | "setnx" | "getset" | "strlen" => {
                if cmdline.len() < 2 {
                    return PyropeError::WrongArgumentCount(name).into();
                }
                self.relay_by_key(session, cmdline).await
            }

            "rename" | "renamenx" => {
                if cmdline.len() != 3 {
                    return PyropeError::WrongArgumentCount(name).into();
                }
                self.exec_rename(session, cmdline).await
            }

            "flushdb" => self.exec_flushdb(session, cmdline).await,

            "del" => {
                if cmdline.len() < 2 {
                    return PyropeError::WrongArgumentCount(name).into();
                }
                self.exec_del(session, cmdline).await
            }

            _ => PyropeError::UnknownCommand(name).into(),
        }
    }

    async fn close(&self) {
        for pool in self.peer_pools.values() {
            pool.close();
        }
    }
}

/// The two-step exchange on a borrowed client: synchronise the remote
/// sub-database, then send the actual command.
async fn relay_on_client(
    client: &mut PooledClient,
    db_index: usize,
    cmdline: &[Bytes],
) -> Result<RespFrame, PyropeError> {
    let select_line = [
        Bytes::from_static(b"select"),
        Bytes::from(db_index.to_string()),
    ];
    let select_reply = client.send(&select_line).await?;
    if select_reply.is_error() {
        return Err(PyropeError::ClusterError(format!(
            "peer refused select {db_index}"
        )));
    }
    client.send(cmdline).await
}

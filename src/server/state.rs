// src/server/state.rs

//! Process-wide state shared between the accept loop and every connection
//! handler.

use crate::config::Config;
use crate::core::database::ExecutionEngine;
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;

pub struct ServerState {
    pub config: Config,
    /// The execution engine serving this process: a standalone `Database`
    /// or a `ClusterDatabase`.
    pub engine: Arc<dyn ExecutionEngine>,
    /// The set of active connections, keyed by session id.
    pub clients: DashMap<u64, ClientInfo>,
    pub shutdown_tx: broadcast::Sender<()>,
}

#[derive(Debug)]
pub struct ClientInfo {
    pub addr: SocketAddr,
    pub created: Instant,
}

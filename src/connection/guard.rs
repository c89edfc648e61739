// src/connection/guard.rs

//! Defines `ConnectionGuard`, an RAII guard for connection resource management.

use crate::server::ServerState;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::debug;

/// Ensures a connection is removed from the active-client set however its
/// handler exits.
pub struct ConnectionGuard {
    state: Arc<ServerState>,
    session_id: u64,
    addr: SocketAddr,
}

impl ConnectionGuard {
    pub(crate) fn new(state: Arc<ServerState>, session_id: u64, addr: SocketAddr) -> Self {
        Self {
            state,
            session_id,
            addr,
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        debug!("cleaning up connection {}", self.addr);
        self.state.clients.remove(&self.session_id);
    }
}

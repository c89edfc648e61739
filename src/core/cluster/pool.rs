// src/core/cluster/pool.rs

//! A bounded pool of long-lived client connections per peer.
//!
//! The pool's factory dials the peer on demand; borrowing waits until an
//! idle client is available or times out. Clients are validated on
//! return, and a client marked broken is destroyed rather than recycled.
//! Remote `SELECT` state is deliberately not tracked here: the router
//! re-synchronises it on every relay.

use super::client::PeerClient;
use crate::core::PyropeError;
use deadpool::managed::{self, Metrics, RecycleError, RecycleResult};
use deadpool::Runtime;
use std::time::Duration;

/// Idle clients kept per peer.
const POOL_MAX_SIZE: usize = 8;
/// Upper bound on waiting for an idle client or a fresh dial.
const BORROW_TIMEOUT: Duration = Duration::from_secs(5);

/// Dials one fixed peer address.
pub struct PeerFactory {
    addr: String,
}

impl managed::Manager for PeerFactory {
    type Type = PeerClient;
    type Error = PyropeError;

    async fn create(&self) -> Result<PeerClient, PyropeError> {
        PeerClient::connect(&self.addr).await
    }

    async fn recycle(
        &self,
        client: &mut PeerClient,
        _metrics: &Metrics,
    ) -> RecycleResult<PyropeError> {
        if client.is_broken() {
            return Err(RecycleError::message("peer connection marked broken"));
        }
        Ok(())
    }
}

pub type PeerPool = managed::Pool<PeerFactory>;
pub type PooledClient = managed::Object<PeerFactory>;

pub fn build_pool(addr: &str) -> Result<PeerPool, PyropeError> {
    PeerPool::builder(PeerFactory {
        addr: addr.to_string(),
    })
    .max_size(POOL_MAX_SIZE)
    .wait_timeout(Some(BORROW_TIMEOUT))
    .create_timeout(Some(BORROW_TIMEOUT))
    .runtime(Runtime::Tokio1)
    .build()
    .map_err(|e| PyropeError::ClusterError(format!("failed to build pool for {addr}: {e}")))
}

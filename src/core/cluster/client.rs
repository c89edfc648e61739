// src/core/cluster/client.rs

//! A long-lived client connection to one cluster peer.

use crate::core::protocol::{RespFrame, RespFrameCodec};
use crate::core::PyropeError;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

// Timeout constants for robust network operations.
const PEER_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const PEER_WRITE_TIMEOUT: Duration = Duration::from_secs(2);
const PEER_READ_TIMEOUT: Duration = Duration::from_secs(3);

/// Sends command lines to a peer and reads single reply frames. A client
/// that fails mid-exchange is marked broken so the pool destroys it
/// instead of recycling it.
pub struct PeerClient {
    framed: Framed<TcpStream, RespFrameCodec>,
    broken: bool,
}

impl PeerClient {
    pub async fn connect(addr: &str) -> Result<Self, PyropeError> {
        let stream = tokio::time::timeout(PEER_CONNECT_TIMEOUT, TcpStream::connect(addr))
            .await
            .map_err(|_| PyropeError::ClusterError(format!("connect timeout to peer {addr}")))??;
        Ok(Self {
            framed: Framed::new(stream, RespFrameCodec),
            broken: false,
        })
    }

    pub fn is_broken(&self) -> bool {
        self.broken
    }

    /// Sends one command line and returns the peer's reply frame.
    pub async fn send(&mut self, cmdline: &[Bytes]) -> Result<RespFrame, PyropeError> {
        let result = self.round_trip(RespFrame::from_cmdline(cmdline)).await;
        if result.is_err() {
            self.broken = true;
        }
        result
    }

    async fn round_trip(&mut self, frame: RespFrame) -> Result<RespFrame, PyropeError> {
        tokio::time::timeout(PEER_WRITE_TIMEOUT, self.framed.send(frame))
            .await
            .map_err(|_| PyropeError::ClusterError("write timeout to peer".into()))??;

        match tokio::time::timeout(PEER_READ_TIMEOUT, self.framed.next()).await {
            Err(_) => Err(PyropeError::ClusterError(
                "read timeout waiting for peer reply".into(),
            )),
            Ok(None) => Err(PyropeError::ClusterError(
                "connection closed by peer".into(),
            )),
            Ok(Some(reply)) => reply,
        }
    }
}

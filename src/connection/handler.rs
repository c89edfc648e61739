// src/connection/handler.rs

//! Defines the `ConnectionHandler` which manages the full lifecycle of a
//! client connection: it owns the parser's payload channel and the write
//! half of the socket, so per-connection replies are emitted in arrival
//! order and never interleaved.

use super::guard::ConnectionGuard;
use super::session::SessionState;
use crate::core::protocol::{parse_stream, RespFrame};
use crate::core::RespValue;
use crate::server::ServerState;
use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast;
use tracing::{debug, warn};

pub struct ConnectionHandler {
    state: Arc<ServerState>,
    session_id: u64,
    addr: SocketAddr,
    shutdown_rx: broadcast::Receiver<()>,
    session: SessionState,
}

impl ConnectionHandler {
    pub fn new(
        state: Arc<ServerState>,
        session_id: u64,
        addr: SocketAddr,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            state,
            session_id,
            addr,
            shutdown_rx,
            session: SessionState::new(),
        }
    }

    /// The main event loop for the connection. Consumes the socket; returns
    /// when the peer disconnects, a write fails, or the server shuts down.
    pub async fn run<S>(mut self, socket: S)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let _guard = ConnectionGuard::new(self.state.clone(), self.session_id, self.addr);
        let (read_half, mut write_half) = tokio::io::split(socket);
        let mut payloads = parse_stream(read_half);

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown_rx.recv() => {
                    debug!("connection handler for {} received shutdown signal", self.addr);
                    return;
                }
                maybe_payload = payloads.recv() => {
                    match maybe_payload {
                        // Unrecoverable I/O on the read side closed the channel.
                        None => {
                            debug!("connection from {} closed by peer", self.addr);
                            return;
                        }
                        // Recoverable protocol error: report it and keep serving.
                        Some(Err(e)) => {
                            let reply: RespValue = e.into();
                            if write_half.write_all(&reply.to_bytes()).await.is_err() {
                                return;
                            }
                        }
                        Some(Ok(frame)) => {
                            let Some(cmdline) = cmdline_from_frame(frame) else {
                                continue;
                            };
                            let reply = self
                                .state
                                .engine
                                .exec(&mut self.session, &cmdline)
                                .await;
                            if let Err(e) = write_half.write_all(&reply.to_bytes()).await {
                                warn!("write to {} failed: {}", self.addr, e);
                                return;
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Commands arrive as multi-bulk frames. A null payload is skipped
/// silently; any other frame kind from a client is logged and skipped.
fn cmdline_from_frame(frame: RespFrame) -> Option<Vec<Bytes>> {
    let items = match frame {
        RespFrame::Array(items) => items,
        // A null payload is ignored, silently.
        RespFrame::Null => return None,
        other => {
            warn!("ignoring non-array frame from client: {:?}", other);
            return None;
        }
    };
    let mut cmdline = Vec::with_capacity(items.len());
    for item in items {
        match item {
            RespFrame::BulkString(b) => cmdline.push(b),
            other => {
                warn!("ignoring command with non-bulk argument: {:?}", other);
                return None;
            }
        }
    }
    Some(cmdline)
}

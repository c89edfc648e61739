// src/server/mod.rs

//! The main server startup function and the accept/shutdown loop.

mod state;

pub use state::{ClientInfo, ServerState};

use crate::config::Config;
use crate::connection::ConnectionHandler;
use crate::core::cluster::ClusterDatabase;
use crate::core::commands::registry;
use crate::core::database::{Database, ExecutionEngine};
use crate::core::persistence::{AofLoader, AofWriterTask, AOF_BUFFER_SIZE};
use anyhow::Result;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{error, info, warn};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

/// How long shutdown waits for in-flight connection handlers to finish
/// writing before aborting them.
const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// The main server entry point: initialises the engine, recovers the
/// append-only log, binds the listener and serves until a signal arrives.
pub async fn run(config: Config) -> Result<()> {
    // The registry lifecycle is explicit: built here, before the first
    // client is accepted, read-only afterwards.
    let command_count = registry::init();
    info!("command table initialised with {} commands", command_count);

    let database = Database::new(config.databases);

    let (shutdown_tx, _) = broadcast::channel(1);
    // The writer gets its own signal, sent only after the connection
    // handlers have drained, so no in-flight mutation record is lost.
    let (persist_shutdown_tx, _) = broadcast::channel(1);
    let mut aof_handle: Option<JoinHandle<()>> = None;

    if config.appendonly {
        // Recovery runs before the writer exists and before any sink
        // sender is installed, so replay cannot re-log itself.
        let loader = AofLoader::new(&config.appendfilename);
        loader.load_into(&database).await?;

        let (aof_tx, aof_rx) = mpsc::channel(AOF_BUFFER_SIZE);
        let writer = AofWriterTask::new(&config.appendfilename, aof_rx).await?;
        database.attach_aof(aof_tx);
        aof_handle = Some(tokio::spawn(writer.run(persist_shutdown_tx.subscribe())));
    }

    let engine: Arc<dyn ExecutionEngine> = if config.cluster_mode() {
        info!(
            "starting in cluster mode as {} with {} peer(s)",
            config.self_addr.as_deref().unwrap_or_default(),
            config.peers.len()
        );
        Arc::new(ClusterDatabase::new(&config, database)?)
    } else {
        Arc::new(database)
    };

    let listener = TcpListener::bind(config.addr()).await?;
    info!("listening on {}", config.addr());

    let state = Arc::new(ServerState {
        config,
        engine,
        clients: DashMap::new(),
        shutdown_tx: shutdown_tx.clone(),
    });

    serve(state.clone(), listener).await;

    // --- Graceful shutdown sequence ---
    state.engine.close().await;
    if let Some(handle) = aof_handle {
        let _ = persist_shutdown_tx.send(());
        if let Err(e) = handle.await {
            error!("append-only writer task ended abnormally: {e:?}");
        }
    }
    info!("server shutdown complete");
    Ok(())
}

/// Accepts connections until a shutdown signal arrives, then drains the
/// connection handlers with a timeout.
async fn serve(state: Arc<ServerState>, listener: TcpListener) {
    let mut session_id_counter: u64 = 0;
    let mut client_tasks = JoinSet::new();

    loop {
        tokio::select! {
            biased;

            _ = await_shutdown_signal() => {
                break;
            }

            res = listener.accept() => {
                match res {
                    Ok((socket, addr)) => {
                        session_id_counter = session_id_counter.wrapping_add(1);
                        let session_id = session_id_counter;
                        info!("accepted connection from {}", addr);

                        state.clients.insert(session_id, ClientInfo {
                            addr,
                            created: Instant::now(),
                        });

                        let handler = ConnectionHandler::new(
                            state.clone(),
                            session_id,
                            addr,
                            state.shutdown_tx.subscribe(),
                        );
                        client_tasks.spawn(handler.run(socket));
                    }
                    Err(e) => error!("failed to accept connection: {}", e),
                }
            }

            // Reap completed client tasks.
            Some(res) = client_tasks.join_next() => {
                if let Err(e) = res {
                    if e.is_panic() {
                        error!("a connection handler panicked: {e:?}");
                    }
                }
            }
        }
    }

    // Stop accepting, then let in-flight handlers finish their writes.
    drop(listener);
    let _ = state.shutdown_tx.send(());
    let drained = tokio::time::timeout(SHUTDOWN_DRAIN_TIMEOUT, async {
        while client_tasks.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        warn!("timed out waiting for connections to drain, aborting the rest");
        client_tasks.shutdown().await;
    }
    info!("all client connections closed");
}

/// Waits for any of the shutdown signals: SIGHUP, SIGINT, SIGQUIT or
/// SIGTERM on Unix, Ctrl+C elsewhere.
async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sighup = signal(SignalKind::hangup()).expect("failed to create SIGHUP stream");
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to create SIGINT stream");
        let mut sigquit = signal(SignalKind::quit()).expect("failed to create SIGQUIT stream");
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to create SIGTERM stream");

        tokio::select! {
            _ = sighup.recv() => info!("SIGHUP received, initiating graceful shutdown"),
            _ = sigint.recv() => info!("SIGINT received, initiating graceful shutdown"),
            _ = sigquit.recv() => info!("SIGQUIT received, initiating graceful shutdown"),
            _ = sigterm.recv() => info!("SIGTERM received, initiating graceful shutdown"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to create Ctrl+C stream");
        info!("Ctrl-C received, initiating graceful shutdown");
    }
}

// src/core/persistence/aof_writer.rs

//! Implements the append-only file writer task.
//!
//! A single dedicated worker drains the bounded record channel and writes
//! each mutation as a RESP multi-bulk frame. The worker keeps a
//! `current_db` cursor and interposes a synthetic `SELECT <n>` frame
//! whenever a record belongs to a differently-indexed sub-database, so the
//! file replays into the same per-database state. Writes are best-effort:
//! I/O errors are logged and the worker continues with the next record.

use super::AofRecord;
use crate::core::protocol::RespFrame;
use bytes::Bytes;
use tokio::fs::{File as TokioFile, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info};

pub struct AofWriterTask {
    writer: BufWriter<TokioFile>,
    path: String,
    rx: mpsc::Receiver<AofRecord>,
    /// The sub-database the tail of the file is currently positioned in.
    current_db: usize,
}

impl AofWriterTask {
    /// Opens the append-only file for appending and takes ownership of the
    /// record channel's receiving end.
    pub async fn new(path: &str, rx: mpsc::Receiver<AofRecord>) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_string(),
            rx,
            current_db: 0,
        })
    }

    /// The main run loop. Exits after draining the channel when either the
    /// shutdown signal fires or every sender is gone.
    pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!("append-only writer started, writing to {}", self.path);
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    info!("append-only writer shutting down, draining pending records");
                    self.drain().await;
                    return;
                }
                maybe_record = self.rx.recv() => {
                    match maybe_record {
                        Some(record) => self.write_record(&record).await,
                        None => {
                            info!("append-only channel closed, writer exiting");
                            self.flush().await;
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Writes whatever is still queued, then flushes.
    async fn drain(&mut self) {
        self.rx.close();
        while let Some(record) = self.rx.recv().await {
            self.write_record(&record).await;
        }
        self.flush().await;
    }

    async fn write_record(&mut self, record: &AofRecord) {
        if record.db_index != self.current_db {
            let select = RespFrame::from_cmdline(&[
                Bytes::from_static(b"select"),
                Bytes::from(record.db_index.to_string()),
            ]);
            if let Err(e) = self.write_frame(&select).await {
                // The cursor stays put; skipping the record keeps the file
                // replayable into the sub-databases it actually describes.
                error!("failed to append SELECT frame: {}", e);
                return;
            }
            self.current_db = record.db_index;
        }

        let frame = RespFrame::from_cmdline(&record.cmdline);
        if let Err(e) = self.write_frame(&frame).await {
            error!("failed to append mutation record: {}", e);
        }
    }

    async fn write_frame(&mut self, frame: &RespFrame) -> std::io::Result<()> {
        self.writer.write_all(&frame.encode_to_vec()).await?;
        self.writer.flush().await
    }

    async fn flush(&mut self) {
        if let Err(e) = self.writer.flush().await {
            error!("failed to flush append-only file: {}", e);
        }
    }
}

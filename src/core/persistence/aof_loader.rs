// src/core/persistence/aof_loader.rs

//! Replays an append-only file into a freshly constructed database at
//! startup.
//!
//! The loader runs before the writer task exists and before any sub-
//! database has its sink sender installed, so replayed commands are never
//! re-logged. A corrupted log is operator business: any parse or I/O
//! error fails startup instead of silently loading a prefix.

use crate::core::database::Database;
use crate::core::protocol::{RespFrame, RespFrameCodec};
use crate::core::PyropeError;
use bytes::{Bytes, BytesMut};
use std::path::Path;
use tokio::fs::File as TokioFile;
use tokio::io::{AsyncReadExt, BufReader};
use tokio_util::codec::Decoder;
use tracing::info;

pub struct AofLoader {
    path: String,
}

impl AofLoader {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
        }
    }

    /// Streams the file through the frame decoder and applies each
    /// multi-bulk frame to the database; `SELECT n` frames steer the
    /// target sub-database. Returns the number of commands applied.
    pub async fn load_into(&self, database: &Database) -> Result<usize, PyropeError> {
        let path = Path::new(&self.path);
        if !path.exists() {
            info!(
                "append-only file '{}' not found, starting with an empty state",
                self.path
            );
            return Ok(0);
        }

        info!("loading data from append-only file: {}", self.path);
        let file = TokioFile::open(path).await?;
        let mut reader = BufReader::new(file);
        let mut buffer = BytesMut::with_capacity(8192);

        let mut codec = RespFrameCodec;
        let mut current_db_index: usize = 0;
        let mut commands_loaded = 0;

        loop {
            if reader.read_buf(&mut buffer).await? == 0 {
                if !buffer.is_empty() {
                    return Err(PyropeError::AofError(
                        "truncated record at end of append-only file".into(),
                    ));
                }
                break;
            }

            // Decode and apply as many frames as the buffer holds.
            while let Some(frame) = codec.decode(&mut buffer)? {
                let cmdline = cmdline_from_frame(frame)?;
                let name = String::from_utf8_lossy(&cmdline[0]).to_ascii_lowercase();

                if name == "select" {
                    current_db_index = parse_select_index(&cmdline, database)?;
                    continue;
                }

                let db = database.db(current_db_index).ok_or_else(|| {
                    PyropeError::AofError(format!(
                        "invalid DB index {current_db_index} during replay"
                    ))
                })?;
                // Replay goes through the non-propagating dispatch path.
                db.dispatch(&cmdline).map_err(|e| {
                    PyropeError::AofError(format!("failed to apply '{name}' from log: {e}"))
                })?;
                commands_loaded += 1;
            }
        }

        info!(
            "loaded {} commands from append-only file",
            commands_loaded
        );
        Ok(commands_loaded)
    }
}

/// A log record must be an array of bulk strings.
fn cmdline_from_frame(frame: RespFrame) -> Result<Vec<Bytes>, PyropeError> {
    let RespFrame::Array(items) = frame else {
        return Err(PyropeError::AofError(
            "append-only file contains a non-array frame".into(),
        ));
    };
    if items.is_empty() {
        return Err(PyropeError::AofError(
            "append-only file contains an empty command".into(),
        ));
    }
    items
        .into_iter()
        .map(|item| match item {
            RespFrame::BulkString(b) => Ok(b),
            _ => Err(PyropeError::AofError(
                "append-only file contains a non-bulk argument".into(),
            )),
        })
        .collect()
}

fn parse_select_index(cmdline: &[Bytes], database: &Database) -> Result<usize, PyropeError> {
    if cmdline.len() != 2 {
        return Err(PyropeError::AofError("malformed SELECT in log".into()));
    }
    let index = std::str::from_utf8(&cmdline[1])
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .ok_or_else(|| PyropeError::AofError("malformed SELECT index in log".into()))?;
    if index >= database.db_count() {
        return Err(PyropeError::AofError(format!(
            "SELECT to out-of-range DB index {index} in log"
        )));
    }
    Ok(index)
}

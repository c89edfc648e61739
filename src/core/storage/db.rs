// src/core/storage/db.rs

//! Defines `Db`, a single sub-database: one independent key-space plus the
//! hook that forwards its mutations to the append-only sink.

use super::dict::Dict;
use crate::core::commands::registry;
use crate::core::commands::spec::{CommandFlags, CommandSpec, WriteOutcome};
use crate::core::persistence::AofRecord;
use crate::core::{PyropeError, RespValue};
use bytes::Bytes;
use once_cell::sync::OnceCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tokio::sync::mpsc;
use tracing::{error, warn};

/// One sub-database. Created at server start, destroyed at server stop,
/// never reallocated. The stored `index` is what the append-only records
/// for this keyspace are tagged with.
#[derive(Debug)]
pub struct Db {
    index: usize,
    pub data: Dict,
    /// Installed after construction when durability is enabled; absent
    /// senders make the write-sink hook a no-op.
    aof_tx: OnceCell<mpsc::Sender<AofRecord>>,
}

impl Db {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            data: Dict::new(),
            aof_tx: OnceCell::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Installs the append-only sender. Called once during startup, after
    /// any recovery replay has completed.
    pub fn attach_aof(&self, tx: mpsc::Sender<AofRecord>) {
        if self.aof_tx.set(tx).is_err() {
            warn!("append-only sink already attached to db {}", self.index);
        }
    }

    /// Executes one command line against this sub-database and forwards the
    /// mutation to the append-only sink when the command actually wrote.
    pub async fn exec(&self, cmdline: &[Bytes]) -> RespValue {
        match self.dispatch(cmdline) {
            Ok((reply, outcome, spec)) => {
                if outcome.mutated() && spec.flags.contains(CommandFlags::WRITE) {
                    self.propagate(spec, &cmdline[1..]).await;
                }
                reply
            }
            Err(e) => e.into(),
        }
    }

    /// The registry-dispatched execution path, without sink propagation.
    /// The append-only loader replays through this so recovery does not
    /// re-log itself.
    pub fn dispatch(
        &self,
        cmdline: &[Bytes],
    ) -> Result<(RespValue, WriteOutcome, &'static CommandSpec), PyropeError> {
        let Some(first) = cmdline.first() else {
            return Err(PyropeError::ProtocolError("empty command".into()));
        };
        let name = String::from_utf8_lossy(first).to_ascii_lowercase();
        let spec = registry::lookup(&name).ok_or(PyropeError::UnknownCommand(name.clone()))?;

        if !arity_ok(spec.arity, cmdline.len()) {
            return Err(PyropeError::WrongArgumentCount(name));
        }

        // An executor panic must not tear down the connection.
        match catch_unwind(AssertUnwindSafe(|| (spec.handler)(self, &cmdline[1..]))) {
            Ok(result) => result.map(|(reply, outcome)| (reply, outcome, spec)),
            Err(panic) => {
                error!("executor for '{}' panicked: {:?}", spec.name, panic);
                Err(PyropeError::Unknown)
            }
        }
    }

    /// Pushes the canonical multi-bulk rendition of the mutation onto the
    /// bounded append-only channel. A full channel blocks the producer;
    /// that back-pressure is the intended rate limit under overload.
    async fn propagate(&self, spec: &CommandSpec, args: &[Bytes]) {
        let Some(tx) = self.aof_tx.get() else {
            return;
        };
        let mut cmdline = Vec::with_capacity(args.len() + 1);
        cmdline.push(Bytes::from_static(spec.name.as_bytes()));
        cmdline.extend(args.iter().cloned());
        if tx
            .send(AofRecord {
                db_index: self.index,
                cmdline,
            })
            .await
            .is_err()
        {
            warn!("append-only channel closed; mutation record dropped");
        }
    }
}

/// Positive arity demands exactly that many elements (command name
/// included); negative arity demands at least `-arity` elements.
fn arity_ok(arity: i64, len: usize) -> bool {
    if arity >= 0 {
        len == arity as usize
    } else {
        len >= (-arity) as usize
    }
}

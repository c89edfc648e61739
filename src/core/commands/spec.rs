// src/core/commands/spec.rs

//! The shape of a registered command: its executor, arity and flags.

use crate::core::storage::Db;
use crate::core::{PyropeError, RespValue};
use bitflags::bitflags;
use bytes::Bytes;

bitflags! {
    /// Properties of a command, consulted by the dispatch layer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CommandFlags: u32 {
        /// The command may modify the dataset.
        const WRITE    = 1 << 0;
        /// The command only reads data.
        const READONLY = 1 << 1;
    }
}

/// What a completed executor did to the keyspace. Only commands that
/// actually mutated are forwarded to the append-only sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    DidNotWrite,
    Write { keys_modified: u64 },
    Delete { keys_deleted: u64 },
    Flush,
}

impl WriteOutcome {
    pub fn mutated(&self) -> bool {
        !matches!(self, WriteOutcome::DidNotWrite)
    }
}

/// The executor signature: the owning sub-database and the arguments after
/// the command name.
pub type ExecFn = fn(&Db, &[Bytes]) -> Result<(RespValue, WriteOutcome), PyropeError>;

/// One entry in the process-wide command registry.
#[derive(Debug)]
pub struct CommandSpec {
    /// Canonical lower-case name; also what the append-only log records.
    pub name: &'static str,
    /// Positive: exact element count, command name included.
    /// Negative: at least `-arity` elements.
    pub arity: i64,
    pub flags: CommandFlags,
    pub handler: ExecFn,
}

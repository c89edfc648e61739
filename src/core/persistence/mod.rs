// src/core/persistence/mod.rs

//! Append-only durability: the writer task that materialises mutations as
//! RESP frames on disk and the loader that replays them at startup.

mod aof_loader;
mod aof_writer;

pub use aof_loader::AofLoader;
pub use aof_writer::AofWriterTask;

use bytes::Bytes;

/// Capacity of the bounded channel between executors and the writer task.
/// A full channel blocks producers, which is the intended rate limit
/// under sustained overload.
pub const AOF_BUFFER_SIZE: usize = 1 << 16;

/// One mutation to be appended: the owning sub-database index and the
/// canonical command line that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct AofRecord {
    pub db_index: usize,
    pub cmdline: Vec<Bytes>,
}

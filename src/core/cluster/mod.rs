// src/core/cluster/mod.rs

//! Cluster mode: consistent-hash key partitioning over a static set of
//! peers, with per-command relay/broadcast routing.

mod client;
mod hash_ring;
mod pool;
mod router;

pub use client::PeerClient;
pub use hash_ring::{crc32_ieee, HashFn, HashRing};
pub use pool::PeerPool;
pub use router::ClusterDatabase;

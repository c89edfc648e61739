// src/core/cluster/hash_ring.rs

//! The consistent-hash ring that maps keys to owning peers.
//!
//! Node names are hashed onto a 32-bit ring; a key belongs to the node
//! whose hash is the first one greater than or equal to the key's hash,
//! wrapping around to the smallest. The hash function is pluggable, but
//! the default must stay CRC-32/IEEE for wire compatibility with existing
//! deployments of this layout.

use crc::{Crc, CRC_32_ISO_HDLC};
use std::collections::HashMap;

pub type HashFn = fn(&[u8]) -> u32;

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// CRC-32 with the IEEE polynomial, the default ring hash.
pub fn crc32_ieee(data: &[u8]) -> u32 {
    CRC32.checksum(data)
}

/// Invariant: `hashes` is sorted ascending and its multiset of values
/// equals the keys of `nodes`.
#[derive(Debug)]
pub struct HashRing {
    hash_fn: HashFn,
    hashes: Vec<u32>,
    nodes: HashMap<u32, String>,
}

impl HashRing {
    pub fn new(hash_fn: Option<HashFn>) -> Self {
        Self {
            hash_fn: hash_fn.unwrap_or(crc32_ieee),
            hashes: Vec::new(),
            nodes: HashMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Hashes each non-empty name onto the ring. Mutated only at startup;
    /// read-only while serving.
    pub fn add_nodes<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            let name = name.as_ref();
            if name.is_empty() {
                continue;
            }
            let hash = (self.hash_fn)(name.as_bytes());
            self.hashes.push(hash);
            self.nodes.insert(hash, name.to_string());
        }
        self.hashes.sort_unstable();
    }

    /// Resolves the node owning `key`, or `None` when the ring is empty.
    pub fn pick_node(&self, key: &[u8]) -> Option<&str> {
        if self.is_empty() {
            return None;
        }
        let hash = (self.hash_fn)(key);
        // First ring position with a hash >= the key's hash, wrapping.
        let mut idx = self.hashes.partition_point(|&h| h < hash);
        if idx == self.hashes.len() {
            idx = 0;
        }
        self.nodes.get(&self.hashes[idx]).map(String::as_str)
    }
}

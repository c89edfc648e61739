// src/core/storage/dict.rs

//! A concurrency-safe dictionary from key to [`DataValue`], the storage
//! unit backing every sub-database.
//!
//! All operations are atomic with respect to each other; the put-if-*
//! variants are check-and-set and rely on the per-entry locking of the
//! underlying map. Iteration order is unspecified and not stable across
//! calls.

use super::data_types::DataValue;
use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

#[derive(Debug, Default)]
pub struct Dict {
    map: DashMap<Bytes, DataValue>,
}

impl Dict {
    pub fn new() -> Self {
        Self {
            map: DashMap::new(),
        }
    }

    /// Returns a copy of the value for `key`, if present.
    pub fn get(&self, key: &[u8]) -> Option<DataValue> {
        self.map.get(key).map(|entry| entry.value().clone())
    }

    /// Unconditional insert. Returns 1 if the key was absent, 0 on update.
    pub fn put(&self, key: Bytes, val: DataValue) -> usize {
        match self.map.insert(key, val) {
            Some(_) => 0,
            None => 1,
        }
    }

    /// Inserts only if the key is absent. Returns 1 if inserted, 0 otherwise.
    pub fn put_if_absent(&self, key: Bytes, val: DataValue) -> usize {
        match self.map.entry(key) {
            Entry::Occupied(_) => 0,
            Entry::Vacant(slot) => {
                slot.insert(val);
                1
            }
        }
    }

    /// Updates only if the key exists. Returns 1 if updated, 0 otherwise.
    pub fn put_if_exists(&self, key: &[u8], val: DataValue) -> usize {
        match self.map.get_mut(key) {
            Some(mut entry) => {
                *entry = val;
                1
            }
            None => 0,
        }
    }

    /// Removes the key. Returns 1 if a value was removed, 0 otherwise.
    pub fn remove(&self, key: &[u8]) -> usize {
        match self.map.remove(key) {
            Some(_) => 1,
            None => 0,
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Visits all entries; the consumer returns `false` to stop early.
    pub fn for_each(&self, mut consumer: impl FnMut(&Bytes, &DataValue) -> bool) {
        for entry in self.map.iter() {
            if !consumer(entry.key(), entry.value()) {
                break;
            }
        }
    }

    /// A snapshot of all keys.
    pub fn keys(&self) -> Vec<Bytes> {
        self.map.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Samples `limit` keys with replacement; may contain duplicates.
    pub fn random_keys(&self, limit: usize) -> Vec<Bytes> {
        let keys = self.keys();
        if keys.is_empty() {
            return Vec::new();
        }
        let mut rng = SmallRng::from_entropy();
        (0..limit)
            .map(|_| keys[rng.gen_range(0..keys.len())].clone())
            .collect()
    }

    /// Samples up to `limit` distinct keys.
    pub fn random_distinct_keys(&self, limit: usize) -> Vec<Bytes> {
        let keys = self.keys();
        let mut rng = SmallRng::from_entropy();
        keys.choose_multiple(&mut rng, limit).cloned().collect()
    }

    /// Removes all entries.
    pub fn clear(&self) {
        self.map.clear();
    }
}

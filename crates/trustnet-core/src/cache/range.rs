//! LRU cache of parsed CIDR ranges
//!
//! Maps a CIDR string to its parsed network so the matching engine pays
//! the parse cost once per range, not once per lookup. Bounded; inserting
//! past capacity evicts the entry untouched longest. Reads and writes
//! both refresh recency. No TTL — parsed ranges never go bad, they are
//! only displaced or cleared wholesale on reload.

use ipnet::IpNet;
use std::collections::HashMap;

use crate::error::{Error, Result};

#[derive(Debug)]
struct Slot {
    net: IpNet,
    touched: u64,
}

/// Bounded LRU cache mapping CIDR strings to parsed networks
#[derive(Debug)]
pub struct RangeCache {
    entries: HashMap<String, Slot>,
    capacity: usize,
    clock: u64,
}

impl RangeCache {
    /// Create a cache holding at most `capacity` parsed ranges
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::config("range cache capacity must be > 0"));
        }
        Ok(Self {
            entries: HashMap::new(),
            capacity,
            clock: 0,
        })
    }

    /// Look up a parsed range, refreshing its recency
    pub fn get(&mut self, key: &str) -> Option<IpNet> {
        self.clock += 1;
        let slot = self.entries.get_mut(key)?;
        slot.touched = self.clock;
        Some(slot.net)
    }

    /// Insert or refresh a parsed range
    ///
    /// Inserting a new key at capacity first drops the least recently
    /// touched entry; rewriting an existing key only refreshes recency.
    pub fn set(&mut self, key: String, net: IpNet) {
        self.clock += 1;
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.evict_oldest();
        }
        self.entries.insert(
            key,
            Slot {
                net,
                touched: self.clock,
            },
        );
    }

    /// Whether a range is currently cached (does not refresh recency)
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of cached ranges
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is cached
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Configured capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn evict_oldest(&mut self) {
        if let Some(oldest) = self
            .entries
            .iter()
            .min_by_key(|(_, slot)| slot.touched)
            .map(|(key, _)| key.clone())
        {
            self.entries.remove(&oldest);
        }
    }
}

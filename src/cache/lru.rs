//! Bounded LRU map from key to log offset
//!
//! Recency is a monotonically increasing tick. `order` maps tick → key, so
//! its first entry is always the least recently used key. Ticks are unique,
//! which makes eviction order among equally old entries insertion order.

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;

use super::stats::CacheStats;

struct Slot {
    offset: u64,
    tick: u64,
}

struct LruState {
    slots: HashMap<String, Slot>,
    order: BTreeMap<u64, String>,
    next_tick: u64,
    capacity: usize,
}

impl LruState {
    fn new(capacity: usize) -> Self {
        Self {
            slots: HashMap::with_capacity(capacity),
            order: BTreeMap::new(),
            next_tick: 0,
            capacity,
        }
    }

    fn bump(&mut self) -> u64 {
        let tick = self.next_tick;
        self.next_tick += 1;
        tick
    }

    fn touch(&mut self, key: &str) -> Option<u64> {
        let tick = self.bump();
        let slot = self.slots.get_mut(key)?;
        let old_tick = std::mem::replace(&mut slot.tick, tick);
        let offset = slot.offset;
        if let Some(owned) = self.order.remove(&old_tick) {
            self.order.insert(tick, owned);
        }
        Some(offset)
    }

    /// Returns the evicted key, if any
    fn insert(&mut self, key: &str, offset: u64) -> Option<String> {
        if self.touch(key).is_some() {
            if let Some(slot) = self.slots.get_mut(key) {
                slot.offset = offset;
            }
            return None;
        }

        let evicted = if self.slots.len() >= self.capacity {
            self.evict_oldest()
        } else {
            None
        };

        let tick = self.bump();
        self.slots.insert(key.to_string(), Slot { offset, tick });
        self.order.insert(tick, key.to_string());
        evicted
    }

    fn evict_oldest(&mut self) -> Option<String> {
        let (_, key) = self.order.pop_first()?;
        self.slots.remove(&key);
        Some(key)
    }
}

/// Thread-safe bounded cache of key → offset with least-recently-used eviction
///
/// Every operation runs under one mutex, so the map and the recency order
/// are always updated together. The cache is never authoritative: a miss
/// falls back to the key index.
pub struct RecencyCache {
    state: Mutex<LruState>,
    stats: CacheStats,
}

impl RecencyCache {
    /// Create a cache holding at most `capacity` keys (minimum 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(LruState::new(capacity.max(1))),
            stats: CacheStats::default(),
        }
    }

    /// Look up `key`, promoting it to most recently used on a hit
    pub fn get(&self, key: &str) -> Option<u64> {
        let found = self.state.lock().touch(key);
        match found {
            Some(_) => self.stats.record_hit(),
            None => self.stats.record_miss(),
        }
        found
    }

    /// Insert or refresh `key`, evicting the least recently used key when a
    /// new key arrives at capacity
    pub fn put(&self, key: &str, offset: u64) {
        let evicted = self.state.lock().insert(key, offset);
        if let Some(evicted) = evicted {
            self.stats.record_eviction();
            tracing::trace!(key = %evicted, "Evicted from recency cache");
        }
    }

    /// Look up without affecting recency or statistics
    pub fn peek(&self, key: &str) -> Option<u64> {
        self.state.lock().slots.get(key).map(|slot| slot.offset)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state.lock().slots.contains_key(key)
    }

    /// Keys from least to most recently used
    pub fn keys_by_recency(&self) -> Vec<String> {
        self.state.lock().order.values().cloned().collect()
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.slots.clear();
        state.order.clear();
    }

    pub fn len(&self) -> usize {
        self.state.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().capacity
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

//! Expiring key/value store with stale reads.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

use crate::clock::Clock;
use crate::models::CacheKey;

/// A cached value with the time it was stored.
///
/// Entries are replaced wholesale on refresh, never mutated in place.
#[derive(Clone, Debug)]
pub struct CacheEntry<V> {
    pub value: V,
    pub stored_at: Instant,
    pub ttl: Duration,
}

impl<V> CacheEntry<V> {
    /// Whether the entry is still within its TTL at `now`.
    pub fn is_fresh(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) < self.ttl
    }

    /// Time elapsed since the entry was stored.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.stored_at)
    }
}

/// Result of a cache lookup.
#[derive(Clone, Debug, PartialEq)]
pub struct Lookup<V> {
    pub value: V,
    pub fresh: bool,
}

/// Expiring key/value store.
///
/// Reads go through a sharded concurrent map so hot lookups don't serialize
/// behind writers. Expired entries are kept (they back stale reads) and are
/// only replaced by a newer `set`. With a capacity configured, inserting a new
/// key into a full store evicts the oldest-written entry.
pub struct TtlStore<V> {
    entries: DashMap<CacheKey, CacheEntry<V>>,
    ttl: Duration,
    capacity: Option<usize>,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> TtlStore<V> {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            capacity: None,
            clock,
        }
    }

    /// Cap the number of keys held.
    pub fn with_capacity_limit(mut self, capacity: Option<usize>) -> Self {
        self.capacity = capacity.filter(|c| *c > 0);
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up `key`, reporting whether the entry is still fresh.
    pub fn get(&self, key: &CacheKey) -> Option<Lookup<V>> {
        let now = self.clock.now();
        self.entries.get(key).map(|entry| Lookup {
            value: entry.value.clone(),
            fresh: entry.is_fresh(now),
        })
    }

    /// Return the value only when it is still fresh.
    pub fn get_fresh(&self, key: &CacheKey) -> Option<V> {
        self.get(key).filter(|hit| hit.fresh).map(|hit| hit.value)
    }

    /// Return whatever is stored for `key`, regardless of age.
    pub fn get_stale(&self, key: &CacheKey) -> Option<V> {
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Store `value` under `key`, replacing any previous entry.
    pub fn set(&self, key: CacheKey, value: V) {
        let entry = CacheEntry {
            value,
            stored_at: self.clock.now(),
            ttl: self.ttl,
        };

        if let Some(capacity) = self.capacity {
            if !self.entries.contains_key(&key) && self.entries.len() >= capacity {
                self.evict_oldest();
            }
        }

        self.entries.insert(key, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.stored_at)
            .map(|entry| entry.key().clone());

        if let Some(key) = oldest {
            debug!(key = %key, "cache full, evicting oldest entry");
            self.entries.remove(&key);
        }
    }
}

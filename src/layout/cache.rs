use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use crate::layout::engine::AdaptiveParams;

/// Cache key: integer canvas and display dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LayoutKey {
    /// Drawing-surface width in pixels.
    pub canvas_width: u32,
    /// Drawing-surface height in pixels.
    pub canvas_height: u32,
    /// Display (container) width in pixels.
    pub display_width: u32,
    /// Display (container) height in pixels.
    pub display_height: u32,
}

/// Counters exposed for diagnostics and tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LayoutCacheStats {
    /// Lookups served from the cache.
    pub hits: u64,
    /// Lookups that missed (absent or expired).
    pub misses: u64,
    /// Entries dropped to make room.
    pub evictions: u64,
    /// Entries dropped because their TTL elapsed.
    pub expirations: u64,
}

struct Entry {
    params: AdaptiveParams,
    inserted_at: Instant,
}

/// Bounded, time-expiring layout cache.
///
/// Eviction is strictly insertion-ordered: reads never refresh an entry's position.
pub struct LayoutCache {
    capacity: usize,
    ttl: Duration,
    entries: HashMap<LayoutKey, Entry>,
    // Insertion order; may hold keys already removed by expiry, skipped lazily on eviction.
    order: VecDeque<LayoutKey>,
    stats: LayoutCacheStats,
}

impl LayoutCache {
    /// Create a cache with `capacity` entries whose results live for `ttl`.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity,
            ttl,
            entries: HashMap::new(),
            order: VecDeque::new(),
            stats: LayoutCacheStats::default(),
        }
    }

    /// Look up `key`, dropping it when expired.
    pub fn get(&mut self, key: &LayoutKey, now: Instant) -> Option<AdaptiveParams> {
        let expired = match self.entries.get(key) {
            None => {
                self.stats.misses = self.stats.misses.saturating_add(1);
                return None;
            }
            Some(e) => now.saturating_duration_since(e.inserted_at) >= self.ttl,
        };
        if expired {
            self.entries.remove(key);
            self.order.retain(|k| k != key);
            self.stats.expirations = self.stats.expirations.saturating_add(1);
            self.stats.misses = self.stats.misses.saturating_add(1);
            return None;
        }
        self.stats.hits = self.stats.hits.saturating_add(1);
        self.entries.get(key).map(|e| e.params)
    }

    /// Insert a result, evicting the oldest insertion once the cache is full.
    pub fn insert(&mut self, key: LayoutKey, params: AdaptiveParams, now: Instant) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.remove(&key).is_some() {
            self.order.retain(|k| *k != key);
        }
        while self.entries.len() >= self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            if self.entries.remove(&oldest).is_some() {
                self.stats.evictions = self.stats.evictions.saturating_add(1);
            }
        }
        self.entries.insert(
            key,
            Entry {
                params,
                inserted_at: now,
            },
        );
        self.order.push_back(key);
    }

    /// Return `true` when `key` is present (expired or not).
    pub fn contains(&self, key: &LayoutKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Return `true` when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry. Counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> LayoutCacheStats {
        self.stats
    }
}

impl std::fmt::Debug for LayoutCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayoutCache")
            .field("capacity", &self.capacity)
            .field("ttl", &self.ttl)
            .field("len", &self.entries.len())
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/layout/cache.rs"]
mod tests;

//! Process-local cache layer.
//!
//! Two independent stores front the database for the read paths: a
//! single-slot node-list cache and a per-range network-stats cache.
//! Neither has TTL-based expiry; correctness depends on explicit
//! invalidation by the reconciliation pipeline, which clears and eagerly
//! repopulates after every successful commit. Discipline: one writer per
//! slot (the pipeline); the read path only falls back to direct
//! computation when a refresh has failed.
//!
//! Both stores are process-local. A multi-process deployment needs an
//! external shared cache instead.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::views::{NetworkStatsPayload, NodeListPayload};

/// A single atomically-replaced cache slot.
///
/// `get` returns a cheap `Arc` clone of the current value, or `None` on
/// a miss; `set` replaces the slot; `clear` empties it.
pub struct CacheSlot<T> {
    slot: RwLock<Option<Arc<T>>>,
}

impl<T> CacheSlot<T> {
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(None),
        }
    }

    pub fn get(&self) -> Option<Arc<T>> {
        self.slot.read().clone()
    }

    pub fn set(&self, value: T) {
        *self.slot.write() = Some(Arc::new(value));
    }

    pub fn clear(&self) {
        *self.slot.write() = None;
    }
}

impl<T> Default for CacheSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The full formatted node list plus precomputed aggregates.
pub type NodeListCache = CacheSlot<NodeListPayload>;

/// Time range selector for the network-stats view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatsRange {
    H24,
    D7,
    D30,
    All,
}

impl StatsRange {
    /// Every range, in display order. Cache refresh repopulates all of
    /// them eagerly.
    pub const ALL: [StatsRange; 4] = [
        StatsRange::H24,
        StatsRange::D7,
        StatsRange::D30,
        StatsRange::All,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            StatsRange::H24 => "24h",
            StatsRange::D7 => "7d",
            StatsRange::D30 => "30d",
            StatsRange::All => "all",
        }
    }

    /// Window length in seconds; `None` for the unbounded range.
    pub fn window_secs(&self) -> Option<i64> {
        match self {
            StatsRange::H24 => Some(24 * 3600),
            StatsRange::D7 => Some(7 * 86_400),
            StatsRange::D30 => Some(30 * 86_400),
            StatsRange::All => None,
        }
    }
}

impl FromStr for StatsRange {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "24h" => Ok(StatsRange::H24),
            "7d" => Ok(StatsRange::D7),
            "30d" => Ok(StatsRange::D30),
            "all" => Ok(StatsRange::All),
            _ => Err(()),
        }
    }
}

/// Per-range network-stats cache: one independent slot per range label.
pub struct NetworkStatsCache {
    slots: RwLock<HashMap<StatsRange, Arc<NetworkStatsPayload>>>,
}

impl NetworkStatsCache {
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, range: StatsRange) -> Option<Arc<NetworkStatsPayload>> {
        self.slots.read().get(&range).cloned()
    }

    pub fn set(&self, range: StatsRange, payload: NetworkStatsPayload) {
        self.slots.write().insert(range, Arc::new(payload));
    }

    pub fn clear(&self) {
        self.slots.write().clear();
    }
}

impl Default for NetworkStatsCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_miss_set_hit_clear() {
        let cache: CacheSlot<u64> = CacheSlot::new();
        assert!(cache.get().is_none());

        cache.set(42);
        assert_eq!(*cache.get().unwrap(), 42);

        cache.set(43);
        assert_eq!(*cache.get().unwrap(), 43);

        cache.clear();
        assert!(cache.get().is_none());
    }

    #[test]
    fn range_labels_round_trip() {
        for range in StatsRange::ALL {
            assert_eq!(range.label().parse::<StatsRange>().unwrap(), range);
        }
        assert!("1y".parse::<StatsRange>().is_err());
    }

    #[test]
    fn stats_slots_are_independent() {
        let cache = NetworkStatsCache::new();
        cache.set(StatsRange::H24, NetworkStatsPayload::empty(StatsRange::H24, 3600));
        assert!(cache.get(StatsRange::H24).is_some());
        assert!(cache.get(StatsRange::D7).is_none());

        cache.clear();
        assert!(cache.get(StatsRange::H24).is_none());
    }
}

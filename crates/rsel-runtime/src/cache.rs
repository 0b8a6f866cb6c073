#![forbid(unsafe_code)]

//! Per-selector query cache with LRU eviction.
//!
//! Maps a [`QueryKey`] to a [`CacheEntry`] that is either in flight
//! (`Pending`) or settled (`Resolved` / `Failed`). The cache never performs
//! I/O; the request controller drives it through [`QueryCache::lookup`],
//! [`QueryCache::begin`] and [`QueryCache::settle`].
//!
//! # Invariants
//!
//! 1. At most one entry per key, hence at most one `Pending` entry per key.
//! 2. `Failed` entries are never hits; looking one up reports a miss.
//! 3. Eviction only removes settled entries, least recently used first.
//!    `Pending` entries are never evicted mid-flight, so the cache may sit
//!    above capacity while many requests are outstanding.
//! 4. A completion is applied only to the entry that carries its sequence;
//!    a completion for a superseded attempt changes nothing.

use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use rsel_core::{FetchError, Item, ItemValue, QueryKey};
use tracing::debug;

/// Lifecycle state of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    /// Fetch issued, no answer yet.
    Pending,
    /// Fetch succeeded; `data` is present.
    Resolved,
    /// Fetch failed; `error` is present.
    Failed,
}

/// One cached (or in-flight) request.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub key: QueryKey,
    pub status: EntryStatus,
    pub data: Option<Rc<[Item<V>]>>,
    pub error: Option<FetchError>,
    pub request_sequence: u64,
}

/// Result of a cache lookup.
#[derive(Debug, Clone)]
pub enum Lookup<V> {
    /// Resolved entry; no I/O needed.
    Hit {
        items: Rc<[Item<V>]>,
        sequence: u64,
    },
    /// A fetch for this key is already running.
    InFlight { sequence: u64 },
    /// Nothing usable (absent or failed).
    Miss,
}

/// Usage counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from a resolved entry.
    pub hits: u64,
    /// Lookups that attached to an in-flight entry.
    pub joins: u64,
    /// Lookups that found nothing usable.
    pub misses: u64,
    /// Settled entries dropped to respect capacity.
    pub evictions: u64,
    /// Completions that updated the cache but were not surfaced.
    pub stale_discards: u64,
}

impl CacheStats {
    /// Fraction of lookups served without a new fetch (0.0 to 1.0).
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.joins + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits + self.joins) as f64 / total as f64
        }
    }
}

/// Bounded map from query key to entry.
#[derive(Debug)]
pub struct QueryCache<V> {
    entries: HashMap<QueryKey, CacheEntry<V>>,
    /// Least recently used at the front.
    lru: VecDeque<QueryKey>,
    capacity: usize,
    stats: CacheStats,
}

impl<V: ItemValue> QueryCache<V> {
    /// Create a cache holding at most `capacity` settled entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            lru: VecDeque::new(),
            capacity: capacity.max(1),
            stats: CacheStats::default(),
        }
    }

    /// Look up `key`, counting the outcome and refreshing recency on a hit.
    pub fn lookup(&mut self, key: &QueryKey) -> Lookup<V> {
        let outcome = match self.entries.get(key) {
            Some(CacheEntry {
                status: EntryStatus::Resolved,
                data: Some(items),
                request_sequence,
                ..
            }) => Lookup::Hit {
                items: Rc::clone(items),
                sequence: *request_sequence,
            },
            Some(CacheEntry {
                status: EntryStatus::Pending,
                request_sequence,
                ..
            }) => Lookup::InFlight {
                sequence: *request_sequence,
            },
            _ => Lookup::Miss,
        };
        match outcome {
            Lookup::Hit { .. } => {
                self.stats.hits += 1;
                self.touch(key);
            }
            Lookup::InFlight { .. } => self.stats.joins += 1,
            Lookup::Miss => self.stats.misses += 1,
        }
        outcome
    }

    /// Record a freshly issued fetch for `key`, replacing a settled entry.
    ///
    /// Returns `false` and leaves the cache untouched if a fetch for `key` is
    /// already pending.
    pub fn begin(&mut self, key: QueryKey, sequence: u64) -> bool {
        if self.status(&key) == Some(EntryStatus::Pending) {
            return false;
        }
        self.touch(&key);
        self.entries.insert(
            key.clone(),
            CacheEntry {
                key,
                status: EntryStatus::Pending,
                data: None,
                error: None,
                request_sequence: sequence,
            },
        );
        true
    }

    /// Apply a completion to the entry carrying `sequence`.
    ///
    /// Returns whether the entry was updated. Evicts down to capacity
    /// afterwards.
    pub fn settle(
        &mut self,
        key: &QueryKey,
        sequence: u64,
        result: Result<Rc<[Item<V>]>, FetchError>,
    ) -> bool {
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        if entry.request_sequence != sequence || entry.status != EntryStatus::Pending {
            return false;
        }
        match result {
            Ok(items) => {
                entry.status = EntryStatus::Resolved;
                entry.data = Some(items);
                entry.error = None;
            }
            Err(error) => {
                entry.status = EntryStatus::Failed;
                entry.data = None;
                entry.error = Some(error);
            }
        }
        self.touch(key);
        self.evict_to_fit();
        true
    }

    /// Entry for `key`, without touching recency or stats.
    #[must_use]
    pub fn get(&self, key: &QueryKey) -> Option<&CacheEntry<V>> {
        self.entries.get(key)
    }

    /// Status of `key`'s entry.
    #[must_use]
    pub fn status(&self, key: &QueryKey) -> Option<EntryStatus> {
        self.entries.get(key).map(|e| e.status)
    }

    /// Drop a settled entry. Pending entries are kept.
    pub fn invalidate(&mut self, key: &QueryKey) -> bool {
        if matches!(self.status(key), None | Some(EntryStatus::Pending)) {
            return false;
        }
        self.entries.remove(key);
        self.lru.retain(|k| k != key);
        true
    }

    /// Drop every settled entry. Pending entries are kept.
    pub fn clear(&mut self) {
        self.entries
            .retain(|_, entry| entry.status == EntryStatus::Pending);
        let entries = &self.entries;
        self.lru.retain(|k| entries.contains_key(k));
    }

    /// Count a completion that was applied but not surfaced.
    pub fn note_stale_discard(&mut self) {
        self.stats.stale_discards += 1;
    }

    /// Number of entries, pending included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries currently in flight.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.entries
            .values()
            .filter(|e| e.status == EntryStatus::Pending)
            .count()
    }

    /// Capacity bound.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Usage counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Move `key` to the most-recently-used end.
    fn touch(&mut self, key: &QueryKey) {
        self.lru.retain(|k| k != key);
        self.lru.push_back(key.clone());
    }

    /// Evict settled entries until at most `capacity` remain. Pending entries
    /// do not count against the bound.
    fn evict_to_fit(&mut self) {
        let mut settled = self.entries.len() - self.pending_len();
        while settled > self.capacity {
            let victim = self.lru.iter().position(|k| {
                self.entries
                    .get(k)
                    .is_some_and(|e| e.status != EntryStatus::Pending)
            });
            let Some(pos) = victim else {
                break;
            };
            if let Some(key) = self.lru.remove(pos) {
                self.entries.remove(&key);
                self.stats.evictions += 1;
                settled -= 1;
                debug!(key = %key, "cache entry evicted");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsel_core::{KeyNormalizer, QueryInput};
    use pretty_assertions::assert_eq;

    fn key(term: &str) -> QueryKey {
        KeyNormalizer::default()
            .normalize(&QueryInput::new("bus-stations").with_term(term))
            .unwrap()
    }

    fn items(values: &[u32]) -> Rc<[Item<u32>]> {
        values
            .iter()
            .map(|v| Item::new(*v, format!("Station {v}")))
            .collect::<Vec<_>>()
            .into()
    }

    fn resolve(cache: &mut QueryCache<u32>, term: &str, seq: u64, values: &[u32]) {
        assert!(cache.begin(key(term), seq));
        assert!(cache.settle(&key(term), seq, Ok(items(values))));
    }

    #[test]
    fn miss_then_pending_then_hit() {
        let mut cache = QueryCache::new(4);
        assert!(matches!(cache.lookup(&key("a")), Lookup::Miss));
        cache.begin(key("a"), 1);
        assert!(matches!(
            cache.lookup(&key("a")),
            Lookup::InFlight { sequence: 1 }
        ));
        cache.settle(&key("a"), 1, Ok(items(&[1, 2])));
        match cache.lookup(&key("a")) {
            Lookup::Hit { items, sequence } => {
                assert_eq!(sequence, 1);
                assert_eq!(items.len(), 2);
            }
            other => panic!("expected hit, got {other:?}"),
        }
        let stats = cache.stats();
        assert_eq!((stats.misses, stats.joins, stats.hits), (1, 1, 1));
    }

    #[test]
    fn begin_refuses_duplicate_pending() {
        let mut cache: QueryCache<u32> = QueryCache::new(4);
        assert!(cache.begin(key("a"), 1));
        assert!(!cache.begin(key("a"), 2));
        assert_eq!(cache.get(&key("a")).unwrap().request_sequence, 1);
    }

    #[test]
    fn failed_entries_are_misses_and_can_be_reissued() {
        let mut cache: QueryCache<u32> = QueryCache::new(4);
        cache.begin(key("a"), 1);
        cache.settle(&key("a"), 1, Err(FetchError::Timeout));
        assert_eq!(cache.status(&key("a")), Some(EntryStatus::Failed));
        assert_eq!(
            cache.get(&key("a")).unwrap().error,
            Some(FetchError::Timeout)
        );
        assert!(matches!(cache.lookup(&key("a")), Lookup::Miss));
        assert!(cache.begin(key("a"), 2));
        assert_eq!(cache.status(&key("a")), Some(EntryStatus::Pending));
    }

    #[test]
    fn settle_ignores_mismatched_sequence() {
        let mut cache = QueryCache::new(4);
        cache.begin(key("a"), 5);
        assert!(!cache.settle(&key("a"), 4, Ok(items(&[1]))));
        assert!(!cache.settle(&key("zzz"), 5, Ok(items(&[1]))));
        assert_eq!(cache.status(&key("a")), Some(EntryStatus::Pending));
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut cache = QueryCache::new(2);
        resolve(&mut cache, "a", 1, &[1]);
        resolve(&mut cache, "b", 2, &[2]);
        // Touch "a" so "b" becomes the oldest.
        assert!(matches!(cache.lookup(&key("a")), Lookup::Hit { .. }));
        resolve(&mut cache, "c", 3, &[3]);

        assert!(cache.get(&key("b")).is_none());
        assert!(cache.get(&key("a")).is_some());
        assert!(cache.get(&key("c")).is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn pending_entries_survive_eviction() {
        let mut cache = QueryCache::new(1);
        cache.begin(key("slow"), 1);
        resolve(&mut cache, "fast", 2, &[9]);
        // Above capacity overall, but only one entry is settled.
        assert_eq!(cache.status(&key("slow")), Some(EntryStatus::Pending));
        assert_eq!(cache.status(&key("fast")), Some(EntryStatus::Resolved));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.pending_len(), 1);
        assert_eq!(cache.stats().evictions, 0);

        resolve(&mut cache, "later", 3, &[7]);
        assert!(cache.get(&key("fast")).is_none());
        assert_eq!(cache.status(&key("later")), Some(EntryStatus::Resolved));
        assert_eq!(cache.status(&key("slow")), Some(EntryStatus::Pending));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn in_flight_fetches_do_not_crowd_out_fresh_results() {
        let mut cache = QueryCache::new(2);
        cache.begin(key("a"), 1);
        cache.begin(key("b"), 2);
        cache.begin(key("c"), 3);
        assert!(cache.settle(&key("c"), 3, Ok(items(&[3]))));

        assert!(matches!(
            cache.lookup(&key("c")),
            Lookup::Hit { sequence: 3, .. }
        ));
        assert_eq!(cache.len() - cache.pending_len(), 1);
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn invalidate_and_clear_keep_pending() {
        let mut cache = QueryCache::new(4);
        resolve(&mut cache, "a", 1, &[1]);
        cache.begin(key("b"), 2);
        assert!(!cache.invalidate(&key("b")));
        assert!(cache.invalidate(&key("a")));
        resolve(&mut cache, "c", 3, &[3]);
        cache.clear();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.status(&key("b")), Some(EntryStatus::Pending));
    }

    #[test]
    fn hit_rate_counts_joins_as_served() {
        let stats = CacheStats {
            hits: 1,
            joins: 1,
            misses: 2,
            ..CacheStats::default()
        };
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }
}

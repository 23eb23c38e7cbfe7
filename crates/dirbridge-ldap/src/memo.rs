//! Bounded, time-expiring concurrent memoization cache.
//!
//! Entries are dropped when they outlive the TTL or when the cache is full. Losing an entry only
//! costs a recomputation, so a poisoned lock is treated as a miss rather than an error.

use std::borrow::Borrow;
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use tracing::debug;

#[cfg_attr(test, mockall::automock)]
pub(crate) trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
}

impl CacheStats {
    /// Calculate cache hit ratio (0.0 to 1.0).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Slot<V> {
    value: V,
    inserted_at: Instant,
    seq: u64,
}

/// Map plus insertion order. An order record is stale once its key was removed or re-inserted.
struct Slots<K, V> {
    map: HashMap<K, Slot<V>>,
    order: VecDeque<(K, u64)>,
    next_seq: u64,
}

impl<K, V> Default for Slots<K, V> {
    fn default() -> Self {
        Self {
            map: HashMap::new(),
            order: VecDeque::new(),
            next_seq: 0,
        }
    }
}

/// Concurrent map with a capacity bound and a per-entry time to live.
pub struct ExpiringCache<K, V> {
    slots: RwLock<Slots<K, V>>,
    capacity: usize,
    ttl: Duration,
    clock: Box<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> ExpiringCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Creates a cache holding at most `capacity` entries for `ttl` each.
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self::with_clock(capacity, ttl, Box::new(SystemClock))
    }

    pub(crate) fn with_clock(capacity: usize, ttl: Duration, clock: Box<dyn Clock>) -> Self {
        Self {
            slots: RwLock::new(Slots::default()),
            capacity: capacity.max(1),
            ttl,
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Maximum number of entries.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Time to live of each entry.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_live(&self, slot: &Slot<V>, now: Instant) -> bool {
        now.saturating_duration_since(slot.inserted_at) < self.ttl
    }

    /// Returns a copy of the live value for `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let now = self.clock.now();
        let found = self
            .slots
            .read()
            .ok()
            .and_then(|slots| {
                slots
                    .map
                    .get(key)
                    .filter(|slot| self.is_live(slot, now))
                    .map(|slot| slot.value.clone())
            });

        let counter = if found.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Stores `value` under `key`, evicting expired entries and then the oldest one if full.
    ///
    /// Eviction walks the insertion order from the front, so it stops at the first live entry
    /// once there is room.
    pub fn insert(&self, key: K, value: V) {
        let now = self.clock.now();
        let Ok(mut guard) = self.slots.write() else {
            return;
        };
        let Slots {
            map,
            order,
            next_seq,
        } = &mut *guard;

        let mut evicted = 0_usize;
        loop {
            let Some((front_key, front_seq)) = order.front() else {
                break;
            };
            let has_room = map.len() < self.capacity || map.contains_key(&key);
            let (stale, keep) = match map.get(front_key).filter(|slot| slot.seq == *front_seq) {
                Some(slot) => (false, has_room && self.is_live(slot, now)),
                None => (true, false),
            };
            if keep {
                break;
            }
            if let Some((oldest, _)) = order.pop_front() {
                if !stale {
                    map.remove(&oldest);
                    evicted += 1;
                }
            }
        }
        if evicted > 0 {
            debug!(evicted, "memoization cache evicted entries");
        }

        let seq = *next_seq;
        *next_seq += 1;
        order.push_back((key.clone(), seq));
        map.insert(
            key,
            Slot {
                value,
                inserted_at: now,
                seq,
            },
        );

        if order.len() > 2 * self.capacity {
            order.retain(|(entry_key, seq)| {
                map.get(entry_key).is_some_and(|slot| slot.seq == *seq)
            });
        }
    }

    /// Returns the cached value or computes, stores and returns it.
    pub fn get_or_insert_with<F>(&self, key: K, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        if let Some(value) = self.get(&key) {
            return value;
        }
        let value = compute();
        self.insert(key, value.clone());
        value
    }

    /// Removes `key`.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.slots
            .write()
            .ok()
            .and_then(|mut slots| slots.map.remove(key))
            .map(|slot| slot.value)
    }

    /// Drops every entry and resets the counters.
    pub fn clear(&self) {
        if let Ok(mut slots) = self.slots.write() {
            slots.map.clear();
            slots.order.clear();
        }
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Number of stored entries, including ones that expired but were not yet purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.read().map(|slots| slots.map.len()).unwrap_or(0)
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the hit/miss counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl<K, V> std::fmt::Debug for ExpiringCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiringCache")
            .field("capacity", &self.capacity)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

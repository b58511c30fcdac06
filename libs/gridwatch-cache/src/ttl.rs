//! Keyed TTL cache with lazy expiry
//!
//! Derived values (chart series) are expensive to rebuild and age
//! predictably, so they sit behind a TTL. Expiry is lazy: an entry dies
//! when a `get` finds it stale, there is no background sweeper. Domain
//! events that make derived data stale ahead of schedule go through
//! [`TtlCache::invalidate`] / [`TtlCache::invalidate_all`] instead.
//!
//! Memory is bounded by key cardinality (the number of distinct sensors),
//! so no LRU or size-based eviction is needed for this workload.

use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;

/// A cached value with its insertion time and lifetime.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub inserted_at: Instant,
    pub ttl: Duration,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            inserted_at: Instant::now(),
            ttl,
        }
    }

    /// Evaluated against the clock at access time.
    pub fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() >= self.ttl
    }

    pub fn age(&self) -> Duration {
        self.inserted_at.elapsed()
    }
}

/// Counter snapshot for the stats surface.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    pub evictions: u64,
}

impl CacheStats {
    /// Hit rate in percent, 0.0 before any access.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Concurrent TTL cache over [`DashMap`].
///
/// ## Example
///
/// ```
/// use gridwatch_cache::TtlCache;
/// use std::time::Duration;
///
/// let cache: TtlCache<&str, u32> = TtlCache::new(Duration::from_secs(60));
/// cache.put("k", 42);
/// assert_eq!(cache.get(&"k"), Some(42));
///
/// cache.invalidate_all();
/// assert_eq!(cache.get(&"k"), None);
/// ```
#[derive(Debug)]
pub struct TtlCache<K, V>
where
    K: Eq + Hash,
{
    entries: DashMap<K, CacheEntry<V>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    insertions: AtomicU64,
    evictions: AtomicU64,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            insertions: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Look up a key, evicting it first if its TTL has elapsed.
    pub fn get(&self, key: &K) -> Option<V> {
        // Evict-then-read keeps the shard lock free while cloning
        if self
            .entries
            .remove_if(key, |_, entry| entry.is_expired())
            .is_some()
        {
            self.evictions.fetch_add(1, Ordering::Relaxed);
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        match self.entries.get(key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            },
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            },
        }
    }

    /// Store a value, restarting its TTL. Overwrites any existing entry.
    pub fn put(&self, key: K, value: V) {
        self.insertions.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(key, CacheEntry::new(value, self.ttl));
    }

    /// Drop one key. Returns whether an entry was present.
    pub fn invalidate(&self, key: &K) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    /// Drop everything regardless of age. Returns the number of entries
    /// removed.
    pub fn invalidate_all(&self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        self.evictions.fetch_add(count as u64, Ordering::Relaxed);
        count
    }

    /// Sweep expired entries out eagerly. Handy for tests and the stats
    /// endpoint; normal operation relies on lazy expiry alone.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        let purged = before - self.entries.len();
        self.evictions.fetch_add(purged as u64, Ordering::Relaxed);
        purged
    }

    /// Entry count, including expired entries not yet collected.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            insertions: self.insertions.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

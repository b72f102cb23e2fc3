//! Bounded TTL cache for resolution results.
//!
//! Keys are canonical moniker strings; values expire after a fixed TTL
//! and the least recently used entry is evicted when the size bound is
//! hit. Reloads purge everything; status updates purge selectively via
//! [`TtlCache::purge_if`].

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Cache hit/miss/eviction counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

struct Entry<V> {
    value: V,
    inserted: Instant,
}

struct Inner<V> {
    map: HashMap<String, Entry<V>>,
    /// Recency order, least recent first.
    order: VecDeque<String>,
}

/// A bounded, TTL-expiring, LRU-evicting cache.
pub struct TtlCache<V> {
    inner: Mutex<Inner<V>>,
    max_size: usize,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<V: Clone> TtlCache<V> {
    /// Creates a cache bounded to `max_size` entries with a fixed TTL.
    #[must_use]
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
            max_size: max_size.max(1),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Fetches a live entry, refreshing its recency.
    ///
    /// Expired entries are removed on the way out and count as misses.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<V> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        match inner.map.get(key) {
            Some(entry) if entry.inserted.elapsed() < self.ttl => {
                let value = entry.value.clone();
                touch(&mut inner.order, key);
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            Some(_) => {
                inner.map.remove(key);
                inner.order.retain(|k| k != key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Inserts a value, evicting the least recently used entry on
    /// overflow.
    pub fn insert(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if inner.map.contains_key(&key) {
            touch(&mut inner.order, &key);
        } else {
            if inner.map.len() >= self.max_size {
                if let Some(oldest) = inner.order.pop_front() {
                    inner.map.remove(&oldest);
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                }
            }
            inner.order.push_back(key.clone());
        }
        inner.map.insert(
            key,
            Entry {
                value,
                inserted: Instant::now(),
            },
        );
    }

    /// Drops every entry.
    pub fn purge_all(&self) {
        let mut inner = self.inner.lock();
        inner.map.clear();
        inner.order.clear();
    }

    /// Drops entries whose value matches the predicate.
    pub fn purge_if(&self, mut predicate: impl FnMut(&V) -> bool) {
        let mut inner = self.inner.lock();
        let doomed: Vec<String> = inner
            .map
            .iter()
            .filter(|(_, entry)| predicate(&entry.value))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            inner.map.remove(key);
        }
        inner.order.retain(|k| !doomed.contains(k));
    }

    /// Number of live entries (expired ones may still be counted until
    /// touched).
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    /// True when the cache holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().map.is_empty()
    }

    /// Counter snapshot.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

impl<V> std::fmt::Debug for TtlCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("len", &self.inner.lock().map.len())
            .field("max_size", &self.max_size)
            .field("ttl", &self.ttl)
            .finish()
    }
}

fn touch(order: &mut VecDeque<String>, key: &str) {
    if let Some(pos) = order.iter().position(|k| k == key) {
        order.remove(pos);
    }
    order.push_back(key.to_string());
}

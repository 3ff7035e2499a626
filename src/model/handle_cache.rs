//! Bounded caches of native handles.
//!
//! One generic LRU is instantiated twice: rendered application icons keyed by
//! pid, and accessibility window handles keyed by window server id. Every
//! mutation goes through a single lock so producers on any thread can share
//! a cache without further coordination.

use std::fmt::Debug;
use std::hash::Hash;
use std::mem;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use static_assertions::assert_impl_all;
use tracing::{debug, trace};

use crate::common::collections::{HashMap, HashSet};
use crate::sys::app::{IconBitmap, pid_t};
use crate::sys::axuielement::AxWindowRef;
use crate::sys::window_server::WindowServerId;

/// A value that can live in a [`HandleCache`].
pub trait CacheValue: Clone + Send {
    /// The process whose exit invalidates this value.
    fn owner_pid(&self) -> pid_t;

    /// Approximate memory retained by this value.
    fn cost_bytes(&self) -> usize;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheLimits {
    /// Size the cache is trimmed down to.
    pub max_size: usize,
    /// Size at which trimming kicks in. The gap to `max_size` lets cleanup
    /// run in bulk instead of once per insert.
    pub cleanup_threshold: usize,
    /// Memory pressure never shrinks the cache below this.
    pub pressure_floor: usize,
}

impl Default for CacheLimits {
    fn default() -> Self {
        Self {
            max_size: 50,
            cleanup_threshold: 60,
            pressure_floor: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub count: usize,
    pub max_size: usize,
    pub total_bytes: usize,
}

struct Entry<V> {
    value: V,
    last_access: u64,
}

struct Inner<K, V> {
    entries: HashMap<K, Entry<V>>,
    /// Logical access clock; strictly increasing so recency never ties.
    clock: u64,
    limits: CacheLimits,
}

impl<K: Eq + Hash + Copy, V> Inner<K, V> {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Evicts least-recently-accessed entries until at most `target` remain.
    fn evict_to(&mut self, target: usize) -> usize {
        let len = self.entries.len();
        if len <= target {
            return 0;
        }
        let mut by_age: Vec<(u64, K)> =
            self.entries.iter().map(|(key, entry)| (entry.last_access, *key)).collect();
        by_age.sort_unstable_by_key(|(last_access, _)| *last_access);
        let excess = len - target;
        for (_, key) in by_age.into_iter().take(excess) {
            self.entries.remove(&key);
        }
        excess
    }
}

pub struct HandleCache<K, V> {
    name: &'static str,
    inner: Mutex<Inner<K, V>>,
}

impl<K, V> HandleCache<K, V>
where
    K: Eq + Hash + Copy + Debug,
    V: CacheValue,
{
    pub fn new(name: &'static str, limits: CacheLimits) -> Self {
        Self {
            name,
            inner: Mutex::new(Inner {
                entries: HashMap::default(),
                clock: 0,
                limits,
            }),
        }
    }

    /// Returns a copy of the cached value and marks it as recently used.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock();
        let now = inner.tick();
        let entry = inner.entries.get_mut(key)?;
        entry.last_access = now;
        Some(entry.value.clone())
    }

    pub fn contains_key(&self, key: &K) -> bool { self.inner.lock().entries.contains_key(key) }

    /// Inserts or refreshes `key`, trimming the cache back to `max_size` once
    /// it reaches the cleanup threshold.
    pub fn put(&self, key: K, value: V) {
        let mut inner = self.inner.lock();
        let now = inner.tick();
        inner.entries.insert(key, Entry { value, last_access: now });

        let CacheLimits { max_size, cleanup_threshold, .. } = inner.limits;
        if inner.entries.len() >= cleanup_threshold {
            let evicted = inner.evict_to(max_size);
            debug!(cache = self.name, evicted, "trimmed cache to {max_size} entries");
        }
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.inner.lock().entries.remove(key).map(|entry| entry.value)
    }

    pub fn clear(&self) {
        let dropped = mem::take(&mut self.inner.lock().entries);
        trace!(cache = self.name, count = dropped.len(), "cleared cache");
    }

    pub fn len(&self) -> usize { self.inner.lock().entries.len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            count: inner.entries.len(),
            max_size: inner.limits.max_size,
            total_bytes: inner.entries.values().map(|e| e.value.cost_bytes()).sum(),
        }
    }

    pub fn limits(&self) -> CacheLimits { self.inner.lock().limits }

    /// Applies new limits, trimming immediately if the cache is now over.
    pub fn set_limits(&self, limits: CacheLimits) {
        let mut inner = self.inner.lock();
        inner.limits = limits;
        if inner.entries.len() > limits.max_size {
            inner.evict_to(limits.max_size);
        }
    }

    /// Drops every entry whose owning process is no longer running,
    /// regardless of how recently it was used.
    ///
    /// `is_alive` is consulted once per distinct pid, outside the lock.
    pub fn prune_dead(&self, is_alive: impl Fn(pid_t) -> bool) -> usize {
        let pids: HashSet<pid_t> =
            self.inner.lock().entries.values().map(|e| e.value.owner_pid()).collect();
        let dead: HashSet<pid_t> = pids.into_iter().filter(|pid| !is_alive(*pid)).collect();
        if dead.is_empty() {
            return 0;
        }
        let removed = self.retain_owners(|pid| !dead.contains(&pid));
        debug!(cache = self.name, removed, ?dead, "pruned entries of exited processes");
        removed
    }

    pub fn remove_owned_by(&self, pid: pid_t) -> usize { self.retain_owners(|owner| owner != pid) }

    /// Halves the cache, never going below the configured floor.
    pub fn handle_memory_pressure(&self) -> usize {
        let mut inner = self.inner.lock();
        let target = (inner.entries.len() / 2).max(inner.limits.pressure_floor);
        let evicted = inner.evict_to(target);
        if evicted > 0 {
            debug!(cache = self.name, evicted, "shrunk cache under memory pressure");
        }
        evicted
    }

    fn retain_owners(&self, keep: impl Fn(pid_t) -> bool) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.entries.len();
        inner.entries.retain(|_, entry| keep(entry.value.owner_pid()));
        before - inner.entries.len()
    }
}

#[derive(Debug, Clone)]
pub struct CachedIcon {
    pub pid: pid_t,
    pub bitmap: IconBitmap,
}

impl CacheValue for CachedIcon {
    fn owner_pid(&self) -> pid_t { self.pid }

    fn cost_bytes(&self) -> usize { self.bitmap.data.len() }
}

#[derive(Debug, Clone)]
pub struct CachedAxHandle {
    pub handle: AxWindowRef,
    pub pid: pid_t,
}

impl CacheValue for CachedAxHandle {
    fn owner_pid(&self) -> pid_t { self.pid }

    fn cost_bytes(&self) -> usize { mem::size_of::<Self>() }
}

pub type IconCache = HandleCache<pid_t, CachedIcon>;
pub type AxHandleCache = HandleCache<WindowServerId, CachedAxHandle>;

assert_impl_all!(IconCache: Send, Sync);
assert_impl_all!(AxHandleCache: Send, Sync);

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use pretty_assertions::assert_eq;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Blob {
        pid: pid_t,
        bytes: usize,
    }

    impl CacheValue for Blob {
        fn owner_pid(&self) -> pid_t { self.pid }

        fn cost_bytes(&self) -> usize { self.bytes }
    }

    fn blob(pid: pid_t) -> Blob { Blob { pid, bytes: 10 } }

    fn cache(max_size: usize, cleanup_threshold: usize) -> HandleCache<u32, Blob> {
        HandleCache::new("test", CacheLimits {
            max_size,
            cleanup_threshold,
            pressure_floor: 10,
        })
    }

    #[test]
    fn sixty_inserts_leave_the_fifty_most_recent() {
        let cache = cache(50, 60);
        for key in 0..60 {
            cache.put(key, blob(1));
        }
        assert_eq!(cache.len(), 50);
        for key in 0..10 {
            assert!(!cache.contains_key(&key), "key {key} should have been evicted");
        }
        for key in 10..60 {
            assert!(cache.contains_key(&key), "key {key} should be present");
        }
    }

    #[test]
    fn reads_protect_entries_from_eviction() {
        let cache = cache(50, 60);
        for key in 0..59 {
            cache.put(key, blob(1));
        }
        // Touch the oldest entries so they become the most recent.
        for key in 0..5 {
            assert!(cache.get(&key).is_some());
        }
        cache.put(59, blob(1));

        assert_eq!(cache.len(), 50);
        for key in 0..5 {
            assert!(cache.contains_key(&key));
        }
        for key in 5..15 {
            assert!(!cache.contains_key(&key));
        }
    }

    #[test]
    fn count_never_exceeds_threshold() {
        let cache = cache(5, 8);
        for key in 0..100 {
            cache.put(key, blob(1));
            assert!(cache.len() < 8, "len {} after put {key}", cache.len());
        }
    }

    #[test]
    fn duplicate_put_refreshes_in_place() {
        let cache = cache(2, 3);
        cache.put(1, blob(1));
        cache.put(2, blob(1));
        cache.put(1, Blob { pid: 7, bytes: 1 });
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&1), Some(Blob { pid: 7, bytes: 1 }));

        // Key 2 is now the least recent and goes first.
        cache.put(3, blob(1));
        assert!(!cache.contains_key(&2));
        assert!(cache.contains_key(&1));
        assert!(cache.contains_key(&3));
    }

    #[test]
    fn liveness_sweep_ignores_recency() {
        let cache = cache(50, 60);
        cache.put(1, blob(100));
        cache.put(2, blob(200));
        cache.put(3, blob(100));
        cache.put(4, blob(200));
        cache.get(&2);
        cache.get(&4);

        let removed = cache.prune_dead(|pid| pid == 100);
        assert_eq!(removed, 2);
        assert!(cache.contains_key(&1));
        assert!(cache.contains_key(&3));
        assert!(!cache.contains_key(&2));
        assert!(!cache.contains_key(&4));
    }

    #[test]
    fn liveness_sweep_checks_each_pid_once() {
        let cache = cache(50, 60);
        for key in 0..10 {
            cache.put(key, blob(42));
        }
        let calls = std::cell::Cell::new(0);
        cache.prune_dead(|_| {
            calls.set(calls.get() + 1);
            true
        });
        assert_eq!(calls.get(), 1);
        assert_eq!(cache.len(), 10);
    }

    #[test]
    fn memory_pressure_halves_down_to_floor() {
        let cache = cache(50, 60);
        for key in 0..40 {
            cache.put(key, blob(1));
        }
        assert_eq!(cache.handle_memory_pressure(), 20);
        assert_eq!(cache.len(), 20);
        assert_eq!(cache.handle_memory_pressure(), 10);
        assert_eq!(cache.len(), 10);
        assert_eq!(cache.handle_memory_pressure(), 0);
        assert_eq!(cache.len(), 10);
        // The survivors are the most recently inserted.
        assert!(cache.contains_key(&39));
        assert!(!cache.contains_key(&29));
    }

    #[test]
    fn stats_report_count_and_bytes() {
        let cache = cache(50, 60);
        cache.put(1, Blob { pid: 1, bytes: 100 });
        cache.put(2, Blob { pid: 1, bytes: 28 });
        assert_eq!(cache.stats(), CacheStats {
            count: 2,
            max_size: 50,
            total_bytes: 128,
        });
        cache.clear();
        assert_eq!(cache.stats().count, 0);
        assert_eq!(cache.stats().total_bytes, 0);
    }

    #[test]
    fn shrinking_limits_trims_immediately() {
        let cache = cache(50, 60);
        for key in 0..30 {
            cache.put(key, blob(1));
        }
        cache.set_limits(CacheLimits {
            max_size: 10,
            cleanup_threshold: 12,
            pressure_floor: 5,
        });
        assert_eq!(cache.len(), 10);
        assert!(cache.contains_key(&29));
    }

    #[test]
    fn concurrent_producers_respect_the_bound() {
        let cache = Arc::new(cache(50, 60));
        let handles: Vec<_> = (0..4u32)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for key in 0..500 {
                        cache.put(t * 1000 + key, blob(t as pid_t));
                        cache.get(&(t * 1000 + key / 2));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(cache.len() < 60);
        assert!(cache.len() >= 50);
    }
}

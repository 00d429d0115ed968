//! In-memory cache with per-entry expiry and LRU eviction.

use super::stats::CacheStats;
use lru::LruCache;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::trace;

/// Entry in the cache.
#[derive(Debug, Clone)]
struct TtlEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> TtlEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Instant `ttl` after `now`, saturating at roughly thirty years out.
fn expiry(now: Instant, ttl: Duration) -> Instant {
    now.checked_add(ttl).or_else(|| now.checked_add(FAR_FUTURE)).unwrap_or(now)
}

const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

struct Inner<K: Hash + Eq, V> {
    entries: LruCache<K, TtlEntry<V>>,
    stats: CacheStats,
}

/// Bounded cache whose entries expire after a fixed time-to-live.
///
/// Reads and writes for a key happen under one lock, so a reader never sees
/// a half-inserted entry. When full, expired entries are dropped first and
/// then the least recently used one.
pub struct TtlCache<K: Hash + Eq, V> {
    inner: Mutex<Inner<K, V>>,
    ttl: Duration,
    capacity: NonZeroUsize,
}

impl<K, V> TtlCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Creates a cache holding at most `capacity` entries (minimum 1).
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                stats: CacheStats::new(),
            }),
            ttl,
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<K, V>> {
        // A panic while holding the lock cannot leave an entry half-written
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Returns a clone of the live value for `key`, marking it recently used.
    pub fn get(&self, key: &K) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    /// [`get`](Self::get) against an explicit clock.
    pub fn get_at(&self, key: &K, now: Instant) -> Option<V> {
        let mut guard = self.lock();
        let inner = &mut *guard;

        let expired = match inner.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                let value = entry.value.clone();
                inner.stats.record_hit();
                return Some(value);
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            inner.entries.pop(key);
            inner.stats.record_expiration(1);
            trace!("cache entry expired");
        }
        inner.stats.record_miss();
        None
    }

    /// Returns the live value for `key` without updating recency or counters.
    pub fn peek(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        self.lock()
            .entries
            .peek(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone())
    }

    /// Stores `value` with a fresh TTL, replacing any previous entry.
    pub fn insert(&self, key: K, value: V) {
        self.insert_at(key, value, Instant::now())
    }

    /// [`insert`](Self::insert) against an explicit clock.
    pub fn insert_at(&self, key: K, value: V, now: Instant) {
        let mut guard = self.lock();
        let inner = &mut *guard;

        let replacing = inner.entries.contains(&key);
        if !replacing && inner.entries.len() >= self.capacity.get() {
            Self::purge_expired_locked(inner, now);
        }

        let entry = TtlEntry {
            value,
            expires_at: expiry(now, self.ttl),
        };
        if inner.entries.push(key, entry).is_some() && !replacing {
            inner.stats.record_eviction(1);
            trace!("cache full, evicted least recently used entry");
        }
        inner.stats.record_insertion();
    }

    /// Removes `key`. Returns true if an entry was present.
    pub fn invalidate(&self, key: &K) -> bool {
        let mut inner = self.lock();
        let removed = inner.entries.pop(key).is_some();
        if removed {
            inner.stats.record_invalidation(1);
        }
        removed
    }

    /// Drops every entry. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let mut inner = self.lock();
        let count = inner.entries.len();
        inner.entries.clear();
        inner.stats.record_invalidation(count as u64);
        count
    }

    /// Drops entries whose TTL has elapsed. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut inner = self.lock();
        Self::purge_expired_locked(&mut inner, Instant::now())
    }

    fn purge_expired_locked(inner: &mut Inner<K, V>, now: Instant) -> usize {
        let expired: Vec<K> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            inner.entries.pop(key);
        }
        inner.stats.record_expiration(expired.len() as u64);
        expired.len()
    }

    /// Number of stored entries, including any not yet purged after expiry.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            entries: inner.entries.len(),
            ..inner.stats.clone()
        }
    }
}

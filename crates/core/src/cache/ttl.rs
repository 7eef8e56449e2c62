//! Bounded TTL map.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;

use crate::metrics;

struct Entry<T> {
    value: T,
    expires_at: Instant,
}

/// Counters exposed by [`TtlCache::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub keys: usize,
}

/// A bounded TTL map with hit/miss accounting.
///
/// Values are opaque to the cache and handed back by clone; callers must not
/// mutate retrieved objects. All methods swallow internal failures: a
/// poisoned lock reads as a miss and drops writes.
pub struct TtlCache<T> {
    tier: &'static str,
    entries: Mutex<HashMap<String, Entry<T>>>,
    default_ttl: Duration,
    max_keys: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<T: Clone + Send + 'static> TtlCache<T> {
    /// `tier` labels the metrics series for this instance.
    pub fn new(tier: &'static str, default_ttl: Duration, max_keys: usize) -> Self {
        Self {
            tier,
            entries: Mutex::new(HashMap::new()),
            default_ttl,
            max_keys: max_keys.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look a key up, treating expired, evicted and unreadable entries as
    /// misses.
    pub fn get(&self, key: &str) -> Option<T> {
        let Ok(mut entries) = self.entries.lock() else {
            self.record_miss();
            return None;
        };

        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                let value = entry.value.clone();
                drop(entries);
                self.record_hit();
                Some(value)
            }
            Some(_) => {
                entries.remove(key);
                drop(entries);
                self.record_miss();
                None
            }
            None => {
                drop(entries);
                self.record_miss();
                None
            }
        }
    }

    /// Store a value under the default TTL.
    pub fn set(&self, key: impl Into<String>, value: T) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Store a value with an explicit TTL.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: T, ttl: Duration) {
        let key = key.into();
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };

        if !entries.contains_key(&key) && entries.len() >= self.max_keys {
            Self::evict_one(&mut entries);
        }

        entries.insert(
            key,
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Remove one exact key.
    pub fn remove(&self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
    }

    /// Remove every key whose identifier contains `pattern`. Returns how
    /// many entries were dropped.
    pub fn delete_matching(&self, pattern: &str) -> usize {
        let Ok(mut entries) = self.entries.lock() else {
            return 0;
        };
        let before = entries.len();
        entries.retain(|key, _| !key.contains(pattern));
        before - entries.len()
    }

    /// Drop everything.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    pub fn stats(&self) -> CacheStats {
        let keys = self.entries.lock().map(|e| e.len()).unwrap_or(0);
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            keys,
        }
    }

    /// Drop expired entries. Called by the periodic sweeper and usable
    /// directly in tests.
    pub fn remove_expired(&self) -> usize {
        let Ok(mut entries) = self.entries.lock() else {
            return 0;
        };
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(tier = self.tier, removed, "cache sweep");
        }
        removed
    }

    /// Spawn a background sweep task. The task stops on its own once the
    /// cache is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let Some(cache) = weak.upgrade() else {
                    break;
                };
                cache.remove_expired();
            }
        })
    }

    /// Evict the entry closest to expiry to make room for a new key.
    fn evict_one(entries: &mut HashMap<String, Entry<T>>) {
        let victim = entries
            .iter()
            .min_by_key(|(_, entry)| entry.expires_at)
            .map(|(key, _)| key.clone());
        if let Some(key) = victim {
            entries.remove(&key);
        }
    }

    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        metrics::CACHE_REQUESTS.with_label_values(&[self.tier, "hit"]).inc();
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        metrics::CACHE_REQUESTS.with_label_values(&[self.tier, "miss"]).inc();
    }
}

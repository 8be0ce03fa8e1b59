//! Populate-once memo cache using [`moka`].
//!
//! A [`MemoCache`] maps a string key to a computed value that is shared
//! behind an [`Arc`]. Entries never expire and are never evicted; the only
//! way to drop them is [`MemoCache::invalidate_all`] or dropping the cache.
//! Keys are used verbatim (no case folding, no trimming).

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use moka::sync::Cache;
use tracing::debug;

// ── cache stats ──────────────────────────────────────────────────────

/// Counters tracking cache effectiveness.
#[derive(Debug)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStats {
    fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Lookups answered from the cache.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Lookups that had to compute their value.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Total lookups (hits + misses).
    pub fn total(&self) -> u64 {
        self.hits() + self.misses()
    }

    /// Hit rate as a value between 0.0 and 1.0 (returns 0.0 if no lookups).
    pub fn hit_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.hits() as f64 / total as f64
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hits={} misses={} total={} rate={:.2}%",
            self.hits(),
            self.misses(),
            self.total(),
            self.hit_rate() * 100.0,
        )
    }
}

// ── memo cache ───────────────────────────────────────────────────────

/// An unbounded, never-evicting memo keyed by string.
///
/// Concurrent callers asking for the same missing key wait on a single
/// computation; every caller gets a clone of the same `Arc`.
///
/// ```ignore
/// let memo: MemoCache<Vec<u32>> = MemoCache::new("squares");
/// let v = memo.get_or_insert_with("3", || (1..=3).map(|n| n * n).collect());
/// assert!(Arc::ptr_eq(&v, &memo.get_or_insert_with("3", Vec::new)));
/// ```
pub struct MemoCache<V> {
    name: &'static str,
    inner: Cache<String, Arc<V>>,
    stats: Arc<CacheStats>,
}

impl<V> Clone for MemoCache<V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            inner: self.inner.clone(),
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<V> fmt::Debug for MemoCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoCache")
            .field("name", &self.name)
            .field("entries", &self.inner.entry_count())
            .field("stats", &self.stats)
            .finish()
    }
}

impl<V> MemoCache<V>
where
    V: Send + Sync + 'static,
{
    /// Create an empty memo. `name` only shows up in logs.
    pub fn new(name: &'static str) -> Self {
        debug!(name, "memo cache created");
        Self {
            name,
            inner: Cache::builder().build(),
            stats: Arc::new(CacheStats::new()),
        }
    }

    /// Look up a memoized value without computing it.
    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        let found = self.inner.get(key);
        match &found {
            Some(_) => self.stats.record_hit(),
            None => self.stats.record_miss(),
        }
        found
    }

    /// Return the memoized value for `key`, computing it with `init` on
    /// the first request. `init` runs at most once per key.
    pub fn get_or_insert_with<F>(&self, key: &str, init: F) -> Arc<V>
    where
        F: FnOnce() -> V,
    {
        let entry = self
            .inner
            .entry_by_ref(key)
            .or_insert_with(|| Arc::new(init()));

        if entry.is_fresh() {
            self.stats.record_miss();
            debug!(cache = self.name, key, "memo computed");
        } else {
            self.stats.record_hit();
            debug!(cache = self.name, key, "memo hit");
        }
        entry.into_value()
    }

    /// Drop every memoized value.
    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
        debug!(cache = self.name, "memo invalidated");
    }

    /// Counters for this memo (shared between clones).
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Number of memoized keys. Pending bookkeeping is flushed first so the
    /// count reflects recent inserts.
    pub fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks();
        self.inner.entry_count()
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn computes_once_per_key() {
        let memo: MemoCache<String> = MemoCache::new("test");
        let calls = AtomicUsize::new(0);

        let first = memo.get_or_insert_with("k", || {
            calls.fetch_add(1, Ordering::SeqCst);
            "value".to_string()
        });
        let second = memo.get_or_insert_with("k", || {
            calls.fetch_add(1, Ordering::SeqCst);
            "other".to_string()
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*second, "value");
        assert_eq!(memo.stats().misses(), 1);
        assert_eq!(memo.stats().hits(), 1);
    }

    #[test]
    fn keys_are_not_normalized() {
        let memo: MemoCache<usize> = MemoCache::new("test");
        memo.get_or_insert_with("Rust", || 1);
        memo.get_or_insert_with("rust", || 2);
        memo.get_or_insert_with(" rust", || 3);

        assert_eq!(memo.entry_count(), 3);
        assert_eq!(memo.get("rust").as_deref(), Some(&2));
    }

    #[test]
    fn empty_values_are_memoized() {
        let memo: MemoCache<Vec<u8>> = MemoCache::new("test");
        let a = memo.get_or_insert_with("none", Vec::new);
        let b = memo.get_or_insert_with("none", || vec![1]);
        assert!(b.is_empty());
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn concurrent_callers_share_one_computation() {
        let memo: MemoCache<u64> = MemoCache::new("test");
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let memo = memo.clone();
                let calls = Arc::clone(&calls);
                std::thread::spawn(move || {
                    memo.get_or_insert_with("shared", || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        42
                    })
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(*handle.join().unwrap(), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn invalidate_all_forces_recompute() {
        let memo: MemoCache<u32> = MemoCache::new("test");
        memo.get_or_insert_with("k", || 1);
        memo.invalidate_all();
        assert_eq!(*memo.get_or_insert_with("k", || 2), 2);
    }

    #[test]
    fn stats_display() {
        let stats = CacheStats::new();
        stats.hits.store(50, Ordering::Relaxed);
        stats.misses.store(50, Ordering::Relaxed);
        let display = format!("{stats}");
        assert!(display.contains("hits=50"));
        assert!(display.contains("misses=50"));
        assert!(display.contains("50.00%"));
    }

    #[test]
    fn hit_rate_no_lookups() {
        let stats = CacheStats::new();
        assert_eq!(stats.hit_rate(), 0.0);
    }
}

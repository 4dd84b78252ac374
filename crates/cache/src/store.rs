use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use crate::expiry::{Expiry, ExpiryQueue};

/// Stale heap entries tolerated before the expiry heap is compacted.
const COMPACTION_SLACK: usize = 64;

#[derive(Debug)]
struct Entry<V> {
    value: V,
    expires_at: Option<Instant>,
    stamp: u64,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug)]
struct State<V> {
    entries: HashMap<String, Entry<V>>,
    expiries: ExpiryQueue,
    next_stamp: u64,
}

impl<V> State<V> {
    fn stamp(&mut self) -> u64 {
        self.next_stamp += 1;
        self.next_stamp
    }

    /// Removes every entry whose expiry is due and returns how many were evicted.
    fn evict_due(&mut self, now: Instant) -> usize {
        let mut evicted = 0;
        while let Some(expiry) = self.expiries.pop_due(now) {
            let live = self
                .entries
                .get(&expiry.key)
                .is_some_and(|e| e.stamp == expiry.stamp);
            if live {
                self.entries.remove(&expiry.key);
                evicted += 1;
            }
        }
        evicted
    }

    fn compact_if_needed(&mut self) {
        let live = self
            .entries
            .values()
            .filter(|e| e.expires_at.is_some())
            .count();
        if self.expiries.len() > live * 2 + COMPACTION_SLACK {
            let expiries = self.entries.iter().filter_map(|(key, e)| {
                e.expires_at.map(|at| Expiry {
                    at,
                    stamp: e.stamp,
                    key: key.clone(),
                })
            });
            let expiries: Vec<_> = expiries.collect();
            self.expiries.rebuild(expiries);
        }
    }
}

struct Inner<V> {
    name: &'static str,
    state: Mutex<State<V>>,
    wake: Arc<Notify>,
}

impl<V> Drop for Inner<V> {
    fn drop(&mut self) {
        // lets the sweeper observe that the cache is gone
        self.wake.notify_one();
    }
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries currently stored, including expired ones not yet swept.
    pub entries: usize,
    /// Scheduled expiries, including stale ones left by replaced keys.
    pub pending_expiries: usize,
}

/// Shared key/value cache with optional per-entry TTL.
///
/// Cloning is cheap; all clones share the same entries. When created inside a
/// Tokio runtime a single background sweeper evicts expired entries; without a
/// runtime expired entries are still never returned, they are dropped lazily.
pub struct Cache<V> {
    inner: Arc<Inner<V>>,
}

impl<V> Clone for Cache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> std::fmt::Debug for Cache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache").field("name", &self.inner.name).finish()
    }
}

impl<V> Default for Cache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Cache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::named("default")
    }

    /// Creates an empty cache whose name labels its logs and metrics.
    pub fn named(name: &'static str) -> Self {
        let wake = Arc::new(Notify::new());
        let inner = Arc::new(Inner {
            name,
            state: Mutex::new(State {
                entries: HashMap::new(),
                expiries: ExpiryQueue::default(),
                next_stamp: 0,
            }),
            wake: Arc::clone(&wake),
        });

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(run_sweeper(Arc::downgrade(&inner), wake));
        } else {
            tracing::debug!(cache = name, "no runtime, expired entries are evicted lazily");
        }

        Self { inner }
    }

    /// Returns the value stored under `key`, or `None` if it is absent or expired.
    pub async fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut state = self.inner.state.lock().await;
        let lookup = state
            .entries
            .get(key)
            .map(|entry| (entry.is_expired(now), entry.value.clone()));

        match lookup {
            Some((false, value)) => {
                drop(state);
                metrics::counter!("cache_hits_total", "cache" => self.inner.name).increment(1);
                tracing::trace!(cache = self.inner.name, key, "cache hit");
                Some(value)
            }
            expired => {
                if expired.is_some() {
                    state.entries.remove(key);
                    metrics::counter!("cache_evictions_total", "cache" => self.inner.name)
                        .increment(1);
                }
                drop(state);
                metrics::counter!("cache_misses_total", "cache" => self.inner.name).increment(1);
                tracing::trace!(cache = self.inner.name, key, "cache miss");
                None
            }
        }
    }

    /// Stores `value` under `key`.
    ///
    /// A positive `ttl` schedules eviction after that interval; `None` or a
    /// zero duration stores the entry without expiry. Setting an existing key
    /// replaces both its value and its pending eviction.
    pub async fn set(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        let key = key.into();
        let expires_at = ttl
            .filter(|ttl| !ttl.is_zero())
            .map(|ttl| Instant::now() + ttl);

        let mut state = self.inner.state.lock().await;
        let stamp = state.stamp();
        let earliest = state.expiries.next_deadline();

        if let Some(at) = expires_at {
            state.expiries.push(Expiry {
                at,
                stamp,
                key: key.clone(),
            });
        }
        tracing::debug!(
            cache = self.inner.name,
            key = %key,
            ttl_ms = ttl.map(|t| t.as_millis() as u64),
            "cache set"
        );
        state.entries.insert(
            key,
            Entry {
                value,
                expires_at,
                stamp,
            },
        );
        state.compact_if_needed();
        drop(state);

        if let Some(at) = expires_at
            && earliest.is_none_or(|earliest| at < earliest)
        {
            self.inner.wake.notify_one();
        }
    }

    /// Removes `key`, cancelling its pending eviction. Returns whether it was present.
    pub async fn delete(&self, key: &str) -> bool {
        let now = Instant::now();
        let removed = self.inner.state.lock().await.entries.remove(key);
        let deleted = removed.is_some_and(|entry| !entry.is_expired(now));
        tracing::debug!(cache = self.inner.name, key, deleted, "cache delete");
        deleted
    }

    /// Returns true if a live entry exists for `key`.
    pub async fn exists(&self, key: &str) -> bool {
        let now = Instant::now();
        self.inner
            .state
            .lock()
            .await
            .entries
            .get(key)
            .is_some_and(|e| !e.is_expired(now))
    }

    /// Removes every entry and every pending eviction.
    pub async fn clear(&self) {
        let mut state = self.inner.state.lock().await;
        state.entries.clear();
        state.expiries.clear();
        drop(state);
        tracing::info!(cache = self.inner.name, "cache cleared");
    }

    /// Evicts every entry whose TTL has elapsed. Returns the number evicted.
    pub async fn sweep_expired(&self) -> usize {
        sweep(&self.inner).await.0
    }

    /// Returns current size statistics.
    pub async fn stats(&self) -> CacheStats {
        let state = self.inner.state.lock().await;
        CacheStats {
            entries: state.entries.len(),
            pending_expiries: state.expiries.len(),
        }
    }
}

/// Evicts due entries and reports the next deadline to sleep until.
async fn sweep<V>(inner: &Inner<V>) -> (usize, Option<Instant>) {
    let mut state = inner.state.lock().await;
    let evicted = state.evict_due(Instant::now());
    let next = state.expiries.next_deadline();
    drop(state);

    if evicted > 0 {
        metrics::counter!("cache_evictions_total", "cache" => inner.name)
            .increment(evicted as u64);
        tracing::debug!(cache = inner.name, evicted, "expired entries swept");
    }
    (evicted, next)
}

/// The single expiry scheduler of a cache.
///
/// Holds only a weak reference while sleeping so that dropping the last
/// [`Cache`] handle ends the task.
async fn run_sweeper<V>(inner: Weak<Inner<V>>, wake: Arc<Notify>)
where
    V: Send + 'static,
{
    loop {
        let next = match inner.upgrade() {
            Some(inner) => sweep(&inner).await.1,
            None => break,
        };

        match next {
            Some(deadline) => {
                tokio::select! {
                    () = tokio::time::sleep_until(deadline) => {}
                    () = wake.notified() => {}
                }
            }
            None => wake.notified().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Option<Duration> {
        Some(Duration::from_secs(s))
    }

    #[tokio::test]
    async fn get_missing_key_returns_none() {
        let cache: Cache<String> = Cache::new();
        assert_eq!(cache.get("missing").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn entry_expires_after_ttl() {
        let cache = Cache::new();
        cache.set("k", "v".to_string(), secs(1)).await;
        assert_eq!(cache.get("k").await.as_deref(), Some("v"));

        tokio::time::advance(Duration::from_millis(1100)).await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn entry_within_ttl_stays_present() {
        let cache = Cache::new();
        cache.set("k", 7_u32, secs(5)).await;

        tokio::time::advance(Duration::from_millis(4900)).await;
        assert_eq!(cache.get("k").await, Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn reset_replaces_value_and_schedule() {
        let cache = Cache::new();
        cache.set("k", "v1".to_string(), None).await;
        cache.set("k", "v2".to_string(), secs(5)).await;
        assert_eq!(cache.get("k").await.as_deref(), Some("v2"));

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn replaced_entry_ignores_earlier_eviction() {
        let cache = Cache::new();
        cache.set("k", "v1".to_string(), secs(1)).await;
        cache.set("k", "v2".to_string(), None).await;

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.sweep_expired().await, 0);
        assert_eq!(cache.get("k").await.as_deref(), Some("v2"));
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_evicts_without_reads() {
        let cache = Cache::new();
        cache.set("a", 1_u32, secs(1)).await;
        cache.set("b", 2_u32, secs(10)).await;

        tokio::time::advance(Duration::from_millis(1500)).await;
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }

        let stats = cache.stats().await;
        assert_eq!(stats.entries, 1);
        assert_eq!(cache.get("b").await, Some(2));
    }

    #[tokio::test]
    async fn delete_reports_presence() {
        let cache = Cache::new();
        cache.set("k", 1_u32, secs(60)).await;

        assert!(cache.delete("k").await);
        assert!(!cache.delete("k").await);
        assert!(!cache.exists("k").await);
    }

    #[tokio::test(start_paused = true)]
    async fn deleted_then_reset_key_keeps_new_ttl() {
        let cache = Cache::new();
        cache.set("k", 1_u32, secs(1)).await;
        cache.delete("k").await;
        cache.set("k", 2_u32, secs(10)).await;

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.sweep_expired().await, 0);
        assert_eq!(cache.get("k").await, Some(2));
    }

    #[tokio::test]
    async fn clear_removes_entries_and_schedules() {
        let cache = Cache::new();
        cache.set("a", 1_u32, secs(60)).await;
        cache.set("b", 2_u32, None).await;

        cache.clear().await;

        let stats = cache.stats().await;
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.pending_expiries, 0);
        assert_eq!(cache.get("a").await, None);
    }

    #[tokio::test]
    async fn zero_ttl_means_no_expiry() {
        let cache = Cache::new();
        cache.set("k", 1_u32, Some(Duration::ZERO)).await;
        assert_eq!(cache.stats().await.pending_expiries, 0);
        assert!(cache.exists("k").await);
    }

    #[tokio::test]
    async fn clones_share_entries() {
        let cache = Cache::new();
        let other = cache.clone();
        cache.set("k", 1_u32, None).await;
        assert_eq!(other.get("k").await, Some(1));
    }

    #[tokio::test]
    async fn repeated_resets_compact_the_heap() {
        let cache = Cache::new();
        for i in 0..500_u32 {
            cache.set("k", i, secs(60)).await;
        }
        let stats = cache.stats().await;
        assert_eq!(stats.entries, 1);
        assert!(stats.pending_expiries <= 2 + COMPACTION_SLACK + 1);
    }

    #[test]
    fn works_without_a_runtime_for_construction() {
        let cache: Cache<u32> = Cache::new();
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        rt.block_on(async {
            cache.set("k", 1, None).await;
            assert_eq!(cache.get("k").await, Some(1));
        });
    }
}

//! Keyed TTL cache with single-flight loading.
//!
//! Concurrent [`PlacementCache::get_or_load`] calls for one key share a single
//! loader run: the first caller leads, later callers wait on a watch channel
//! for its outcome. Expiry is measured against an injected [`Clock`].

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use placement_core::error::{PlacementError, Result};
use tokio::sync::watch;
use tracing::debug;

// ── Clock ─────────────────────────────────────────────────────────────────────

/// Source of "now" for expiry checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Slots ─────────────────────────────────────────────────────────────────────

/// What followers observe: `None` until the leader finishes.
type LoadOutcome<V> = Option<std::result::Result<V, String>>;

enum Slot<V> {
    Ready {
        value: V,
        expires_at: DateTime<Utc>,
    },
    Loading {
        generation: u64,
        rx: watch::Receiver<LoadOutcome<V>>,
    },
}

enum Role<V> {
    Lead {
        generation: u64,
        tx: watch::Sender<LoadOutcome<V>>,
    },
    Follow(watch::Receiver<LoadOutcome<V>>),
}

// ── PlacementCache ────────────────────────────────────────────────────────────

/// TTL cache keyed by string.
///
/// The slot map sits behind a std mutex that is never held across an await.
pub struct PlacementCache<V> {
    clock: Arc<dyn Clock>,
    ttl: Duration,
    slots: Mutex<HashMap<String, Slot<V>>>,
    next_generation: AtomicU64,
}

impl<V: Clone> PlacementCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            ttl,
            slots: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Unexpired value for `key`, if any.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        match self.slots().get(key) {
            Some(Slot::Ready { value, expires_at }) if *expires_at > now => Some(value.clone()),
            _ => None,
        }
    }

    /// Store `value` under `key` with a fresh TTL.
    ///
    /// An in-flight load for the same key will not overwrite it.
    pub fn insert(&self, key: impl Into<String>, value: V) {
        let expires_at = self.clock.now() + self.ttl;
        self.slots()
            .insert(key.into(), Slot::Ready { value, expires_at });
    }

    /// Return the cached value for `key`, or run `loader` to produce it.
    ///
    /// Only one loader runs per key at a time. A failed load is not cached,
    /// and every caller waiting on it gets [`PlacementError::CacheLoad`].
    /// If the key is invalidated while loading, the value is still returned
    /// to the waiting callers but is not stored.
    pub async fn get_or_load<F, Fut, E>(&self, key: &str, loader: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>>,
        E: Display,
    {
        let (generation, tx) = loop {
            match self.claim(key) {
                Ok(value) => return Ok(value),
                Err(Role::Lead { generation, tx }) => break (generation, tx),
                Err(Role::Follow(mut rx)) => {
                    let outcome = match rx.wait_for(Option::is_some).await {
                        Ok(seen) => (*seen).clone(),
                        Err(_) => None,
                    };
                    match outcome {
                        Some(Ok(value)) => return Ok(value),
                        Some(Err(message)) => {
                            return Err(PlacementError::CacheLoad {
                                key: key.to_string(),
                                message,
                            })
                        }
                        // Leader was dropped mid-load; try to take over.
                        None => continue,
                    }
                }
            }
        };

        let mut guard = LoadGuard {
            cache: self,
            key,
            generation,
            armed: true,
        };

        let outcome = loader().await.map_err(|e| e.to_string());
        self.complete(key, generation, &outcome);
        guard.armed = false;
        // Followers may all be gone; that is fine.
        let _ = tx.send(Some(outcome.clone()));

        outcome.map_err(|message| PlacementError::CacheLoad {
            key: key.to_string(),
            message,
        })
    }

    /// Drop `key`, ready or loading. Returns whether anything was removed.
    pub fn invalidate(&self, key: &str) -> bool {
        self.slots().remove(key).is_some()
    }

    /// Drop every key starting with `prefix`. Returns how many were removed.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut slots = self.slots();
        let before = slots.len();
        slots.retain(|key, _| !key.starts_with(prefix));
        before - slots.len()
    }

    /// Drop every expired ready entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut slots = self.slots();
        let before = slots.len();
        slots.retain(|_, slot| match slot {
            Slot::Ready { expires_at, .. } => *expires_at > now,
            Slot::Loading { .. } => true,
        });
        before - slots.len()
    }

    /// Number of slots, including in-flight loads and unpurged expired entries.
    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ── Private helpers ───────────────────────────────────────────────────

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot<V>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hit, follow an in-flight load, or register as the leader.
    fn claim(&self, key: &str) -> std::result::Result<V, Role<V>> {
        let now = self.clock.now();
        let mut slots = self.slots();
        match slots.get(key) {
            Some(Slot::Ready { value, expires_at }) if *expires_at > now => {
                return Ok(value.clone())
            }
            Some(Slot::Loading { rx, .. }) => return Err(Role::Follow(rx.clone())),
            _ => {}
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = watch::channel(None);
        slots.insert(key.to_string(), Slot::Loading { generation, rx });
        Err(Role::Lead { generation, tx })
    }

    /// Settle the leader's slot, unless it was invalidated or replaced.
    fn complete(&self, key: &str, generation: u64, outcome: &std::result::Result<V, String>) {
        let mut slots = self.slots();
        let current = matches!(
            slots.get(key),
            Some(Slot::Loading { generation: g, .. }) if *g == generation
        );
        if !current {
            debug!(key, "cache slot changed during load; result not stored");
            return;
        }

        match outcome {
            Ok(value) => {
                let expires_at = self.clock.now() + self.ttl;
                slots.insert(
                    key.to_string(),
                    Slot::Ready {
                        value: value.clone(),
                        expires_at,
                    },
                );
            }
            Err(message) => {
                debug!(key, error = %message, "cache load failed; not caching");
                slots.remove(key);
            }
        }
    }

    fn abandon(&self, key: &str, generation: u64) {
        let mut slots = self.slots();
        if matches!(
            slots.get(key),
            Some(Slot::Loading { generation: g, .. }) if *g == generation
        ) {
            slots.remove(key);
            debug!(key, "cache load abandoned");
        }
    }
}

/// Clears the leader's loading slot if its future is dropped before finishing.
struct LoadGuard<'a, V: Clone> {
    cache: &'a PlacementCache<V>,
    key: &'a str,
    generation: u64,
    armed: bool,
}

impl<V: Clone> Drop for LoadGuard<'_, V> {
    fn drop(&mut self) {
        if self.armed {
            self.cache.abandon(self.key, self.generation);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration as StdDuration;

    fn manual_cache(ttl_secs: i64) -> (PlacementCache<u32>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        ));
        let cache = PlacementCache::with_clock(Duration::seconds(ttl_secs), clock.clone());
        (cache, clock)
    }

    #[tokio::test]
    async fn test_concurrent_loads_share_one_run() {
        let (cache, _clock) = manual_cache(60);
        let calls = AtomicUsize::new(0);
        let calls = &calls;
        let load = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(StdDuration::from_millis(20)).await;
            Ok::<_, String>(7)
        };

        let (a, b, c) = tokio::join!(
            cache.get_or_load("k", load),
            cache.get_or_load("k", load),
            cache.get_or_load("k", load),
        );
        assert_eq!(a.unwrap(), 7);
        assert_eq!(b.unwrap(), 7);
        assert_eq!(c.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get("k"), Some(7));
    }

    #[tokio::test]
    async fn test_entries_expire_by_injected_clock() {
        let (cache, clock) = manual_cache(60);
        cache.insert("k", 1);
        assert_eq!(cache.get("k"), Some(1));

        clock.advance(Duration::seconds(59));
        assert_eq!(cache.get("k"), Some(1));

        clock.advance(Duration::seconds(1));
        assert_eq!(cache.get("k"), None);

        let reloaded = cache
            .get_or_load("k", || async { Ok::<_, String>(2) })
            .await
            .unwrap();
        assert_eq!(reloaded, 2);
    }

    #[tokio::test]
    async fn test_failed_load_is_not_cached() {
        let (cache, _clock) = manual_cache(60);
        let err = cache
            .get_or_load("k", || async { Err::<u32, _>("disk unavailable") })
            .await
            .unwrap_err();
        match err {
            PlacementError::CacheLoad { key, message } => {
                assert_eq!(key, "k");
                assert_eq!(message, "disk unavailable");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(cache.is_empty());

        let value = cache
            .get_or_load("k", || async { Ok::<_, String>(3) })
            .await
            .unwrap();
        assert_eq!(value, 3);
    }

    #[tokio::test]
    async fn test_followers_see_leader_failure() {
        let (cache, _clock) = manual_cache(60);
        let failing = || async {
            tokio::time::sleep(StdDuration::from_millis(10)).await;
            Err::<u32, _>("boom")
        };
        let (a, b) = tokio::join!(
            cache.get_or_load("k", failing),
            cache.get_or_load("k", || async { Ok::<_, String>(9) }),
        );
        assert!(matches!(a, Err(PlacementError::CacheLoad { .. })));
        assert!(matches!(b, Err(PlacementError::CacheLoad { .. })));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_invalidated_load_returns_but_is_not_stored() {
        let (cache, _clock) = manual_cache(60);
        let (value, removed) = tokio::join!(
            cache.get_or_load("k", || async {
                tokio::time::sleep(StdDuration::from_millis(30)).await;
                Ok::<_, String>(5)
            }),
            async {
                tokio::time::sleep(StdDuration::from_millis(5)).await;
                cache.invalidate("k")
            },
        );
        assert_eq!(value.unwrap(), 5);
        assert!(removed);
        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_dropped_leader_releases_slot() {
        let (cache, _clock) = manual_cache(60);
        let slow = cache.get_or_load("k", || async {
            tokio::time::sleep(StdDuration::from_secs(5)).await;
            Ok::<_, String>(1)
        });
        assert!(tokio::time::timeout(StdDuration::from_millis(10), slow)
            .await
            .is_err());
        assert!(cache.is_empty());

        let value = cache
            .get_or_load("k", || async { Ok::<_, String>(2) })
            .await
            .unwrap();
        assert_eq!(value, 2);
    }

    #[test]
    fn test_invalidate_prefix() {
        let (cache, _clock) = manual_cache(60);
        cache.insert("a.json::items", 1);
        cache.insert("a.json::dashboard::*..*|", 2);
        cache.insert("b.json::items", 3);

        assert_eq!(cache.invalidate_prefix("a.json::"), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("b.json::items"), Some(3));
        assert!(!cache.invalidate("a.json::items"));
    }

    #[test]
    fn test_purge_expired() {
        let (cache, clock) = manual_cache(60);
        cache.insert("old", 1);
        clock.advance(Duration::seconds(30));
        cache.insert("new", 2);
        clock.advance(Duration::seconds(45));

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("new"), Some(2));
    }

    #[test]
    fn test_manual_clock_set() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        clock.set(start + Duration::days(2));
        assert_eq!(clock.now(), start + Duration::days(2));
    }
}

//! Dynamic Metric Store - Ephemeral Metrics with Eviction Metadata
//!
//! Dynamically registered metrics (per workflow, per template, ...) are
//! kept here together with the data the garbage collector needs to
//! decide when they are stale. The store is written by two independent
//! actors: the code updating metric values and the garbage collector
//! deleting entries. All access goes through one map-wide mutex.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use super::eviction::is_evictable;

/// A dynamically registered metric plus its eviction metadata.
#[derive(Debug, Clone)]
pub struct DynamicMetricEntry<M> {
    metric: M,
    last_updated: Instant,
    realtime: bool,
    completed: bool,
}

impl<M> DynamicMetricEntry<M> {
    fn new(metric: M, realtime: bool) -> Self {
        Self {
            metric,
            last_updated: Instant::now(),
            realtime,
            completed: false,
        }
    }

    pub fn metric(&self) -> &M {
        &self.metric
    }

    pub fn last_updated(&self) -> Instant {
        self.last_updated
    }

    pub fn is_realtime(&self) -> bool {
        self.realtime
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Whether the garbage collector may drop this entry at `now`.
    pub fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        let idle = now.saturating_duration_since(self.last_updated);
        is_evictable(self.realtime, self.completed, idle, ttl)
    }
}

/// Key → entry map shared between metric updaters and the garbage collector.
///
/// Keys are kept ordered so that every snapshot enumerates metrics in a
/// stable order. A poisoned lock is recovered rather than propagated:
/// the map holds no invariant a panicking updater could break halfway.
#[derive(Debug)]
pub struct DynamicMetricStore<M> {
    entries: Mutex<BTreeMap<String, DynamicMetricEntry<M>>>,
}

impl<M> Default for DynamicMetricStore<M> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
        }
    }
}

impl<M: Clone> DynamicMetricStore<M> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, DynamicMetricEntry<M>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace the metric stored under `key`.
    ///
    /// The entry starts fresh: `last_updated` is now and `completed` is
    /// cleared. Returns the metric that was replaced, if any.
    pub fn register(&self, key: impl Into<String>, metric: M, realtime: bool) -> Option<M> {
        self.lock()
            .insert(key.into(), DynamicMetricEntry::new(metric, realtime))
            .map(|previous| previous.metric)
    }

    /// Return the metric under `key`, registering `make()` if absent.
    pub fn get_or_register<F>(&self, key: &str, realtime: bool, make: F) -> M
    where
        F: FnOnce() -> M,
    {
        self.lock()
            .entry(key.to_string())
            .or_insert_with(|| DynamicMetricEntry::new(make(), realtime))
            .metric
            .clone()
    }

    /// Record that the metric under `key` changed value.
    pub fn touch(&self, key: &str) -> bool {
        match self.lock().get_mut(key) {
            Some(entry) => {
                entry.last_updated = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Mark the unit of work behind a realtime metric as finished.
    ///
    /// Does not refresh `last_updated`: the idle clock keeps running from
    /// the last value change.
    pub fn mark_completed(&self, key: &str) -> bool {
        match self.lock().get_mut(key) {
            Some(entry) => {
                entry.completed = true;
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, key: &str) -> Option<M> {
        self.lock().remove(key).map(|entry| entry.metric)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<DynamicMetricEntry<M>> {
        self.lock().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Clone out every metric handle, ordered by key.
    ///
    /// Callers collect from the handles after the lock is released.
    pub fn handles(&self) -> Vec<M> {
        self.lock().values().map(|entry| entry.metric.clone()).collect()
    }

    /// Drop every entry whose eviction condition holds at `now`.
    ///
    /// Returns the evicted keys.
    pub fn evict_expired(&self, ttl: Duration, now: Instant) -> Vec<String> {
        let mut evicted = Vec::new();
        self.lock().retain(|key, entry| {
            if entry.is_expired(ttl, now) {
                evicted.push(key.clone());
                false
            } else {
                true
            }
        });
        evicted
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    const TTL: Duration = Duration::from_secs(5);

    fn store() -> DynamicMetricStore<u32> {
        DynamicMetricStore::new()
    }

    #[test]
    fn test_register_replaces_and_resets() {
        let store = store();
        assert_eq!(store.register("wf/a", 1, true), None);
        store.mark_completed("wf/a");
        assert_eq!(store.register("wf/a", 2, true), Some(1));

        let entry = store.get("wf/a").unwrap();
        assert_eq!(*entry.metric(), 2);
        assert!(!entry.is_completed());
    }

    #[test]
    fn test_get_or_register_keeps_existing() {
        let store = store();
        assert_eq!(store.get_or_register("wf/a", false, || 7), 7);
        assert_eq!(store.get_or_register("wf/a", false, || 9), 7);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_handles_are_ordered_by_key() {
        let store = store();
        store.register("c", 3, false);
        store.register("a", 1, false);
        store.register("b", 2, false);
        assert_eq!(store.handles(), vec![1, 2, 3]);
    }

    #[test]
    fn test_touch_and_complete_unknown_key() {
        let store = store();
        assert!(!store.touch("missing"));
        assert!(!store.mark_completed("missing"));
    }

    #[test]
    fn test_evict_expired_applies_policy() {
        let store = store();
        store.register("historical", 1, false);
        store.register("running", 2, true);
        store.register("finished", 3, true);
        store.mark_completed("finished");

        let now = Instant::now();
        assert!(store.evict_expired(TTL, now).is_empty());

        let mut evicted = store.evict_expired(TTL, now + Duration::from_secs(10));
        evicted.sort();
        assert_eq!(evicted, vec!["finished", "historical"]);
        assert!(store.contains("running"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_zero_ttl_keeps_everything() {
        let store = store();
        store.register("historical", 1, false);
        let later = Instant::now() + Duration::from_secs(3600);
        assert!(store.evict_expired(Duration::ZERO, later).is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_concurrent_update_and_eviction() {
        let store = Arc::new(DynamicMetricStore::<u32>::new());
        let mut workers = Vec::new();

        for worker in 0..4u32 {
            let store = Arc::clone(&store);
            workers.push(std::thread::spawn(move || {
                for i in 0..500u32 {
                    let key = format!("wf/{}", i % 16);
                    store.register(key.clone(), worker, i % 2 == 0);
                    store.touch(&key);
                    store.mark_completed(&key);
                }
            }));
        }

        let gc_store = Arc::clone(&store);
        let gc = std::thread::spawn(move || {
            for _ in 0..200 {
                gc_store.evict_expired(Duration::from_nanos(1), Instant::now() + TTL);
            }
        });

        for worker in workers {
            worker.join().unwrap();
        }
        gc.join().unwrap();

        assert!(store.len() <= 16);
    }
}

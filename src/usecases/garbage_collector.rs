//! Garbage Collector - Periodic Eviction of Stale Dynamic Metrics
//!
//! Ticks once per TTL and drops every dynamic metric whose eviction
//! condition holds. A zero TTL disables the task entirely.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::domain::DynamicMetricStore;

pub struct GarbageCollector<M> {
    store: Arc<DynamicMetricStore<M>>,
    ttl: Duration,
}

impl<M: Clone> GarbageCollector<M> {
    pub fn new(store: Arc<DynamicMetricStore<M>>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    /// Tick every TTL until `cancel` fires.
    ///
    /// The first scan happens one TTL after start.
    #[instrument(skip_all, fields(ttl_secs = self.ttl.as_secs_f64()))]
    pub async fn run(self, cancel: CancellationToken) {
        if !self.is_enabled() {
            debug!("Dynamic metric TTL is zero, garbage collector disabled");
            return;
        }

        let mut ticker = interval_at(Instant::now() + self.ttl, self.ttl);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Dynamic metric garbage collector started");

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    info!("Dynamic metric garbage collector stopped");
                    return;
                }
                _ = ticker.tick() => {
                    self.sweep(Instant::now());
                }
            }
        }
    }

    /// One eviction pass at `now`. Returns the number of evicted entries.
    pub fn sweep(&self, now: Instant) -> usize {
        let evicted = self.store.evict_expired(self.ttl, now);
        if !evicted.is_empty() {
            debug!(
                count = evicted.len(),
                remaining = self.store.len(),
                keys = ?evicted,
                "Evicted stale dynamic metrics"
            );
        }
        evicted.len()
    }
}

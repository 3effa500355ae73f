//! Metric Set - Static, Dynamic and Always-Present Collectors
//!
//! The collector registered into the primary scrape registry. It
//! aggregates three groups, always enumerated in this order:
//!
//! 1. the static metric set supplied by the application,
//! 2. the dynamic metrics currently held in the store,
//! 3. the always-present named metrics (log events, missing pods,
//!    workflow conditions).

use std::sync::Arc;

use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{GaugeVec, IntCounterVec, Opts};

use crate::domain::DynamicMetricStore;

/// Store of dynamically registered collectors.
pub type DynamicCollectors = DynamicMetricStore<Arc<dyn Collector>>;

/// The three metrics every scrape of the primary endpoint carries.
///
/// All names follow `<namespace>_*`.
#[derive(Clone)]
pub struct NamedMetrics {
    /// Emitted log events by level.
    log_messages: IntCounterVec,
    /// Pods expected by a workflow but not found.
    pods_missing: IntCounterVec,
    /// Workflows by condition type and status.
    workflow_condition: GaugeVec,
}

impl NamedMetrics {
    pub fn new(namespace: &str) -> prometheus::Result<Self> {
        let log_messages = IntCounterVec::new(
            Opts::new("log_messages_total", "Total number of log messages by level")
                .namespace(namespace),
            &["level"],
        )?;

        let pods_missing = IntCounterVec::new(
            Opts::new("pods_missing_total", "Incidents of pods missing")
                .namespace(namespace),
            &["recently_started", "node_phase"],
        )?;

        let workflow_condition = GaugeVec::new(
            Opts::new("workflow_condition", "Workflow condition")
                .namespace(namespace),
            &["type", "status"],
        )?;

        Ok(Self {
            log_messages,
            pods_missing,
            workflow_condition,
        })
    }

    pub fn log_messages(&self) -> &IntCounterVec {
        &self.log_messages
    }

    pub fn pods_missing(&self) -> &IntCounterVec {
        &self.pods_missing
    }

    pub fn workflow_condition(&self) -> &GaugeVec {
        &self.workflow_condition
    }

    fn collectors(&self) -> [&dyn Collector; 3] {
        [
            &self.log_messages,
            &self.pods_missing,
            &self.workflow_condition,
        ]
    }
}

/// Aggregate collector for the primary metrics endpoint.
///
/// Cheap to clone: every part is reference counted, so clones observe
/// the same metric values and the same dynamic store.
#[derive(Clone)]
pub struct MetricSet {
    static_metrics: Arc<[Box<dyn Collector>]>,
    dynamic: Arc<DynamicCollectors>,
    named: NamedMetrics,
}

impl MetricSet {
    pub fn new(
        static_metrics: Vec<Box<dyn Collector>>,
        dynamic: Arc<DynamicCollectors>,
        named: NamedMetrics,
    ) -> Self {
        Self {
            static_metrics: static_metrics.into(),
            dynamic,
            named,
        }
    }

    /// Shared handle to the dynamic store, for updaters and the collector task.
    pub fn dynamic(&self) -> Arc<DynamicCollectors> {
        Arc::clone(&self.dynamic)
    }

    pub fn named(&self) -> &NamedMetrics {
        &self.named
    }

    /// Freeze the current membership for one describe/collect pass.
    pub fn snapshot(&self) -> MetricSnapshot<'_> {
        MetricSnapshot {
            set: self,
            dynamic: self.dynamic.handles(),
        }
    }
}

impl Collector for MetricSet {
    /// Descriptors of the fixed groups only.
    ///
    /// Dynamic members come and go between scrapes, so they are
    /// collected without being pre-registered.
    fn desc(&self) -> Vec<&Desc> {
        self.static_metrics
            .iter()
            .flat_map(|metric| metric.desc())
            .chain(self.named.collectors().into_iter().flat_map(|metric| metric.desc()))
            .collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        self.snapshot().collect().collect()
    }
}

/// Membership of a [`MetricSet`] frozen at one point in time.
///
/// `describe` and `collect` walk the same members in the same order,
/// so every collected family has a matching descriptor. Both can be
/// called repeatedly.
///
/// Scrapes only use `collect` (through [`Collector::collect`]); the
/// registry never sees dynamic descriptors. `describe` is the full
/// descriptor view for diagnostics and tests.
pub struct MetricSnapshot<'a> {
    set: &'a MetricSet,
    dynamic: Vec<Arc<dyn Collector>>,
}

impl MetricSnapshot<'_> {
    fn members(&self) -> impl Iterator<Item = &dyn Collector> + '_ {
        let named: [&dyn Collector; 3] = self.set.named.collectors();
        self.set
            .static_metrics
            .iter()
            .map(|metric| &**metric as &dyn Collector)
            .chain(self.dynamic.iter().map(|metric| &**metric as &dyn Collector))
            .chain(named)
    }

    pub fn describe(&self) -> impl Iterator<Item = &Desc> + '_ {
        self.members().flat_map(|metric| metric.desc())
    }

    pub fn collect(&self) -> impl Iterator<Item = MetricFamily> + '_ {
        self.members().flat_map(|metric| metric.collect())
    }

    pub fn dynamic_len(&self) -> usize {
        self.dynamic.len()
    }
}

//! Domain layer - Dynamic metric bookkeeping and eviction policy.
//!
//! Pure logic: no HTTP, no Prometheus encoding. The store is generic
//! over the metric handle so it can be exercised in isolation.

pub mod dynamic_metrics;
pub mod eviction;

pub use dynamic_metrics::{DynamicMetricEntry, DynamicMetricStore};
pub use eviction::is_evictable;

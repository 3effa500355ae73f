//! Metrics Adapters
//!
//! Prometheus collectors and registries behind the scrape endpoints,
//! plus the tracing layer that counts log events.

pub mod collector;
pub mod log_layer;
pub mod registry;

pub use collector::{DynamicCollectors, MetricSet, MetricSnapshot, NamedMetrics};
pub use log_layer::LogEventCounter;

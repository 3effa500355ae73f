//! Scrape Registries - What Each Endpoint Serves
//!
//! A registry is built per supervisor run and handed to exactly one
//! endpoint server. Nothing here is global.

use prometheus::Registry;

use super::collector::MetricSet;
use crate::error::Result;

/// Registry for the metrics endpoint.
///
/// When the telemetry endpoint shares the listener, the runtime
/// self-metrics are registered alongside the metric set.
pub fn metrics_registry(metric_set: &MetricSet, with_runtime: bool) -> Result<Registry> {
    let registry = Registry::new();
    registry.register(Box::new(metric_set.clone()))?;

    if with_runtime {
        register_runtime(&registry)?;
    }

    Ok(registry)
}

/// Registry for a standalone telemetry endpoint: runtime self-metrics only.
pub fn telemetry_registry() -> Result<Registry> {
    let registry = Registry::new();
    register_runtime(&registry)?;
    Ok(registry)
}

#[cfg(target_os = "linux")]
fn register_runtime(registry: &Registry) -> Result<()> {
    use prometheus::process_collector::ProcessCollector;

    registry.register(Box::new(ProcessCollector::for_self()))?;
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn register_runtime(_registry: &Registry) -> Result<()> {
    tracing::debug!("Process collector unavailable on this platform, telemetry is empty");
    Ok(())
}

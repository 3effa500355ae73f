//! Workflow Metrics Server — Entry Point
//!
//! Initializes configuration, logging and the metric set, then runs
//! the metrics/telemetry endpoints until SIGINT or a fatal server error.
//!
//! Wiring sequence:
//! 1. Load config.toml (path from argv[1]) + validate
//! 2. Init tracing (JSON structured logging + log event counter)
//! 3. Build the metric set (static + dynamic + always-present)
//! 4. Start the supervisor (servers + garbage collector)
//! 5. Wait for SIGINT → cancel → bounded shutdown
//!    or a fatal server error → exit 1

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use workflow_metrics_server::adapters::metrics::{
    DynamicCollectors, LogEventCounter, MetricSet, NamedMetrics,
};
use workflow_metrics_server::config;
use workflow_metrics_server::usecases::ServerSupervisor;

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration ───────────────────────────────
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = config::loader::load_config(&config_path)
        .context("Failed to load configuration")?;

    // ── 2. Always-present metrics + structured JSON logging ─
    let named = NamedMetrics::new(&config.service.namespace)
        .context("Failed to create always-present metrics")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.service.log_level)),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .with(LogEventCounter::new(named.log_messages().clone()))
        .init();

    info!(
        name = %config.service.name,
        version = env!("CARGO_PKG_VERSION"),
        dummy = config.service.dummy_metrics,
        "Starting workflow metrics server"
    );

    // ── 3. Metric set shared with the rest of the process ───
    let dynamic = Arc::new(DynamicCollectors::new());
    let metric_set = MetricSet::new(Vec::new(), Arc::clone(&dynamic), named);

    // ── 4. Start servers + garbage collector ────────────────
    let cancel = CancellationToken::new();
    let supervisor = ServerSupervisor::new(
        config.metrics.clone(),
        config.telemetry.clone(),
        metric_set,
    )
    .with_dummy(config.service.dummy_metrics);

    let Some(mut handle) = supervisor
        .start(&cancel)
        .context("Failed to start metrics servers")?
    else {
        info!("Metrics disabled, waiting for shutdown signal");
        signal::ctrl_c().await.context("Failed to listen for SIGINT")?;
        return Ok(());
    };

    // ── 5. Wait for SIGINT or a fatal server error ──────────
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("SIGINT received, shutting down metrics servers");
            cancel.cancel();
            if let Err(e) = handle.wait().await {
                error!(error = %e, "Metrics server failed during shutdown");
            }
        }
        outcome = handle.wait() => {
            if let Err(e) = outcome {
                error!(error = %e, "Fatal metrics server error, aborting");
                cancel.cancel();
                std::process::exit(1);
            }
        }
    }

    info!(dynamic_metrics = dynamic.len(), "Shutdown complete");
    Ok(())
}

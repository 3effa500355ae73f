//! Server Supervisor - Metrics/Telemetry Topology and Task Ownership
//!
//! Decides whether the metrics and telemetry endpoints share one
//! listener or run as two, spawns the servers and the dynamic metric
//! garbage collector into one task group, and hands that group back to
//! the caller. Everything is torn down by a single cancellation token.
//!
//! Startup is non-blocking: `start` only builds registries and spawns.
//! Fatal server errors surface through `SupervisorHandle::wait`; the
//! caller decides whether to abort the process.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::{Id, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use super::garbage_collector::GarbageCollector;
use crate::adapters::metrics::registry;
use crate::adapters::metrics::MetricSet;
use crate::adapters::server::{EndpointServer, ServerState};
use crate::adapters::tls::SelfSignedProvisioner;
use crate::config::ServerEndpointConfig;
use crate::error::{Result, ServerError};
use crate::ports::tls::CertificateProvisioner;

/// How the two endpoints map onto listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    /// Metrics endpoint disabled: nothing runs.
    Disabled,
    /// One listener serves metrics and runtime telemetry.
    Shared,
    /// Metrics and telemetry on independent listeners.
    Split,
    /// Metrics only; telemetry disabled.
    MetricsOnly,
}

/// Which endpoint a running server stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointRole {
    Metrics,
    Telemetry,
    MetricsAndTelemetry,
}

impl EndpointRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Metrics => "metrics",
            Self::Telemetry => "telemetry",
            Self::MetricsAndTelemetry => "metrics+telemetry",
        }
    }
}

pub struct ServerSupervisor {
    metrics: ServerEndpointConfig,
    telemetry: ServerEndpointConfig,
    metric_set: MetricSet,
    dummy: bool,
    provisioner: Arc<dyn CertificateProvisioner>,
}

impl ServerSupervisor {
    pub fn new(
        metrics: ServerEndpointConfig,
        telemetry: ServerEndpointConfig,
        metric_set: MetricSet,
    ) -> Self {
        Self {
            metrics,
            telemetry,
            metric_set,
            dummy: false,
            provisioner: Arc::new(SelfSignedProvisioner::default()),
        }
    }

    /// Serve 200-only endpoints instead of scrape output.
    #[must_use]
    pub fn with_dummy(mut self, dummy: bool) -> Self {
        self.dummy = dummy;
        self
    }

    #[must_use]
    pub fn with_provisioner(mut self, provisioner: Arc<dyn CertificateProvisioner>) -> Self {
        self.provisioner = provisioner;
        self
    }

    pub fn topology(&self) -> Topology {
        if !self.metrics.enabled {
            Topology::Disabled
        } else if self.metrics.same_server_as(&self.telemetry) {
            Topology::Shared
        } else if self.telemetry.enabled {
            Topology::Split
        } else {
            Topology::MetricsOnly
        }
    }

    /// Spawn the servers and the garbage collector.
    ///
    /// Returns `None` when the metrics endpoint is disabled. Must be
    /// called from within a Tokio runtime.
    ///
    /// # Errors
    /// Registry construction failures. Server startup failures are
    /// reported later by [`SupervisorHandle::wait`].
    #[instrument(skip_all, fields(dummy = self.dummy))]
    pub fn start(&self, cancel: &CancellationToken) -> Result<Option<SupervisorHandle>> {
        let topology = self.topology();
        if topology == Topology::Disabled {
            info!("Metrics endpoint disabled, not starting metrics servers");
            return Ok(None);
        }

        let mut handle = SupervisorHandle::new();
        let shared = topology == Topology::Shared;
        let metrics_registry = registry::metrics_registry(&self.metric_set, shared)?;

        if topology == Topology::Split {
            let telemetry_registry = registry::telemetry_registry()?;
            handle.spawn_server(
                EndpointRole::Telemetry,
                self.server(self.telemetry.clone(), telemetry_registry),
                cancel,
            );
        }

        let role = if shared {
            EndpointRole::MetricsAndTelemetry
        } else {
            EndpointRole::Metrics
        };
        handle.spawn_server(role, self.server(self.metrics.clone(), metrics_registry), cancel);

        let gc = GarbageCollector::new(self.metric_set.dynamic(), self.metrics.ttl);
        handle.spawn_gc(gc, cancel);

        info!(
            ?topology,
            servers = handle.servers.len(),
            gc_enabled = handle.gc_enabled,
            "Metrics servers started"
        );
        Ok(Some(handle))
    }

    fn server(&self, config: ServerEndpointConfig, registry: prometheus::Registry) -> EndpointServer {
        EndpointServer::new(config, registry, self.dummy, Arc::clone(&self.provisioner))
    }
}

/// A supervised server, observable for its lifecycle state.
#[derive(Debug, Clone)]
pub struct ServerStatus {
    pub role: EndpointRole,
    pub config: ServerEndpointConfig,
    pub state: watch::Receiver<ServerState>,
}

/// Task group owned by the caller of [`ServerSupervisor::start`].
///
/// Dropping the handle aborts every task in the group.
pub struct SupervisorHandle {
    tasks: JoinSet<Result<()>>,
    names: HashMap<Id, String>,
    servers: Vec<ServerStatus>,
    gc_enabled: bool,
}

impl SupervisorHandle {
    fn new() -> Self {
        Self {
            tasks: JoinSet::new(),
            names: HashMap::new(),
            servers: Vec::with_capacity(2),
            gc_enabled: false,
        }
    }

    fn spawn_server(&mut self, role: EndpointRole, server: EndpointServer, cancel: &CancellationToken) {
        self.servers.push(ServerStatus {
            role,
            config: server.config().clone(),
            state: server.subscribe(),
        });
        let abort = self.tasks.spawn(server.run(cancel.clone()));
        self.names.insert(abort.id(), format!("{} server", role.as_str()));
    }

    fn spawn_gc<M>(&mut self, gc: GarbageCollector<M>, cancel: &CancellationToken)
    where
        M: Clone + Send + Sync + 'static,
    {
        self.gc_enabled = gc.is_enabled();
        let cancel = cancel.clone();
        let abort = self.tasks.spawn(async move {
            gc.run(cancel).await;
            Ok(())
        });
        self.names.insert(abort.id(), "garbage collector".to_string());
    }

    pub fn servers(&self) -> &[ServerStatus] {
        &self.servers
    }

    pub fn gc_enabled(&self) -> bool {
        self.gc_enabled
    }

    /// Wait for every task to finish.
    ///
    /// Returns the first fatal error as soon as it happens; remaining
    /// tasks keep running until the handle is dropped or waited on again.
    pub async fn wait(&mut self) -> Result<()> {
        while let Some(joined) = self.tasks.join_next_with_id().await {
            match joined {
                Ok((id, Ok(()))) => {
                    self.names.remove(&id);
                }
                Ok((id, Err(err))) => {
                    let task = self.names.remove(&id).unwrap_or_default();
                    error!(task = %task, error = %err, "Fatal metrics server error");
                    return Err(err);
                }
                Err(err) if err.is_cancelled() => {
                    warn!(task = ?self.names.remove(&err.id()), "Supervised task cancelled");
                }
                Err(err) => {
                    let task = self.names.remove(&err.id()).unwrap_or_default();
                    return Err(ServerError::Task {
                        task,
                        reason: err.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

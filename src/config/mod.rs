//! Configuration Module - TOML-based Server Configuration
//!
//! Loads and validates configuration from `config.toml`. The metrics
//! and telemetry endpoints are described by two independent
//! `ServerEndpointConfig` blocks; everything the serving layer needs
//! is externalized here.

pub mod loader;

use std::time::Duration;

use serde::{Deserialize, Deserializer};

/// Top-level configuration.
///
/// Loaded from `config.toml` at startup. Endpoint blocks are validated
/// before any listener is bound.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Service identity and logging.
  #[serde(default)]
  pub service: ServiceConfig,
  /// Prometheus metrics endpoint (application + dynamic metrics).
  #[serde(default)]
  pub metrics: ServerEndpointConfig,
  /// Telemetry endpoint (runtime self-metrics).
  #[serde(default)]
  pub telemetry: ServerEndpointConfig,
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
  /// Human-readable service name.
  #[serde(default = "default_service_name")]
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
  /// Serve 200-only endpoints instead of real scrape output.
  #[serde(default)]
  pub dummy_metrics: bool,
  /// Prefix for the always-present metric names.
  #[serde(default = "default_namespace")]
  pub namespace: String,
}

impl Default for ServiceConfig {
  fn default() -> Self {
    Self {
      name: default_service_name(),
      log_level: default_log_level(),
      dummy_metrics: false,
      namespace: default_namespace(),
    }
  }
}

/// One logical scrape endpoint (metrics or telemetry).
///
/// `port` and `path` are only meaningful when `enabled` is set.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerEndpointConfig {
  /// Whether the endpoint is served at all.
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Listen port (all interfaces).
  #[serde(default = "default_port")]
  pub port: u16,
  /// Route path, must start with `/`.
  #[serde(default = "default_path")]
  pub path: String,
  /// Serve HTTPS with a self-signed certificate.
  #[serde(default)]
  pub secure: bool,
  /// Skip metric families that fail to encode instead of failing the scrape.
  #[serde(default)]
  pub ignore_scrape_errors: bool,
  /// Idle time after which dynamic metrics are evicted (zero disables).
  #[serde(
    default,
    rename = "ttl_seconds",
    deserialize_with = "duration_from_secs"
  )]
  pub ttl: Duration,
}

impl Default for ServerEndpointConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      port: default_port(),
      path: default_path(),
      secure: false,
      ignore_scrape_errors: false,
      ttl: Duration::ZERO,
    }
  }
}

impl ServerEndpointConfig {
  /// Whether both endpoints resolve to the same listener.
  ///
  /// Two enabled endpoints with equal `(port, path, secure)` share one
  /// server and one registry.
  pub fn same_server_as(&self, other: &Self) -> bool {
    self.enabled
      && other.enabled
      && self.port == other.port
      && self.path == other.path
      && self.secure == other.secure
  }
}

fn duration_from_secs<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
  D: Deserializer<'de>,
{
  u64::deserialize(deserializer).map(Duration::from_secs)
}

// Default value functions for serde

fn default_service_name() -> String {
  "workflow-controller".to_string()
}

fn default_log_level() -> String {
  "info".to_string()
}

fn default_namespace() -> String {
  "workflows".to_string()
}

fn default_true() -> bool {
  true
}

fn default_port() -> u16 {
  9090
}

fn default_path() -> String {
  "/metrics".to_string()
}

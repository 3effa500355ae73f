//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating the endpoint blocks,
//! and providing clear error messages for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::{AppConfig, ServerEndpointConfig};

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config = parse_config(&content)?;

  info!(
    metrics_enabled = config.metrics.enabled,
    metrics_port = config.metrics.port,
    telemetry_enabled = config.telemetry.enabled,
    telemetry_port = config.telemetry.port,
    ttl_seconds = config.metrics.ttl.as_secs(),
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  let config: AppConfig =
    toml::from_str(content).with_context(|| "Failed to parse config.toml")?;

  validate_config(&config)?;

  Ok(config)
}

/// Validate all configuration parameters.
fn validate_config(config: &AppConfig) -> Result<()> {
  validate_endpoint("metrics", &config.metrics)?;
  validate_endpoint("telemetry", &config.telemetry)?;

  anyhow::ensure!(
    !config.service.namespace.is_empty(),
    "service.namespace must not be empty"
  );

  Ok(())
}

/// Disabled endpoints are not checked: their port and path are unused.
fn validate_endpoint(name: &str, endpoint: &ServerEndpointConfig) -> Result<()> {
  if !endpoint.enabled {
    return Ok(());
  }

  anyhow::ensure!(endpoint.port != 0, "{name}.port must be non-zero");
  anyhow::ensure!(
    endpoint.path.starts_with('/'),
    "{name}.path must start with '/', got {:?}",
    endpoint.path
  );

  Ok(())
}

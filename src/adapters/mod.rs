//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (Prometheus, axum, rustls). Each sub-module
//! groups adapters by infrastructure concern.
//!
//! Adapter categories:
//! - `metrics`: Prometheus collectors, registries and the log counter
//! - `server`: scrape endpoints and their shutdown lifecycle
//! - `tls`: self-signed certificate provisioning

pub mod metrics;
pub mod server;
pub mod tls;

//! Serving-layer error type.
//!
//! Every variant is fatal at startup: a misconfigured observability
//! endpoint must not keep running silently. Shutdown problems are never
//! reported through this type; they are logged where they happen.

use std::net::SocketAddr;

use thiserror::Error;

/// Result alias used by the serving layer.
pub type Result<T> = std::result::Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    /// Route paths must be absolute.
    #[error("invalid endpoint path {path:?}: must start with '/'")]
    InvalidPath { path: String },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("TLS setup failed: {0}")]
    Tls(String),

    #[error("invalid TLS_MIN_VERSION {value:?}")]
    InvalidTlsVersion { value: String },

    /// The listener stopped without a shutdown request.
    #[error("{name} on port {port} stopped unexpectedly: {reason}")]
    Serve {
        name: &'static str,
        port: u16,
        reason: String,
    },

    #[error("metric registration failed: {0}")]
    Registry(#[from] prometheus::Error),

    /// A supervised task panicked.
    #[error("task {task} failed: {reason}")]
    Task { task: String, reason: String },
}

impl From<rustls::Error> for ServerError {
    fn from(err: rustls::Error) -> Self {
        Self::Tls(err.to_string())
    }
}

impl From<rcgen::Error> for ServerError {
    fn from(err: rcgen::Error) -> Self {
        Self::Tls(err.to_string())
    }
}

//! TLS Provisioning Port - Certificate Material for Secure Endpoints
//!
//! Secure endpoints obtain their `rustls::ServerConfig` from a
//! provisioner. The serving layer only decides the minimum protocol
//! version; how the certificate is produced stays behind this trait.

use std::fmt;

use tracing::warn;

use crate::error::ServerError;

/// Environment variable holding the numeric minimum TLS version.
pub const TLS_MIN_VERSION_ENV: &str = "TLS_MIN_VERSION";

const TLS_1_0: u16 = 0x0301;
const TLS_1_1: u16 = 0x0302;
const TLS_1_2: u16 = 0x0303;
const TLS_1_3: u16 = 0x0304;

/// Lowest TLS protocol version a secure endpoint accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsMinVersion {
    #[default]
    Tls12,
    Tls13,
}

impl TlsMinVersion {
    /// Read the minimum version from `TLS_MIN_VERSION`.
    ///
    /// # Errors
    /// `InvalidTlsVersion` when the variable is set to anything other
    /// than a known protocol code.
    pub fn from_env() -> Result<Self, ServerError> {
        Self::parse(std::env::var(TLS_MIN_VERSION_ENV).ok().as_deref())
    }

    /// Parse a numeric protocol code (`771` = TLS 1.2, `772` = TLS 1.3).
    ///
    /// TLS 1.0 and 1.1 are accepted but raised to TLS 1.2, the lowest
    /// version the server offers. `None` and blank values yield the default.
    pub fn parse(value: Option<&str>) -> Result<Self, ServerError> {
        let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
            return Ok(Self::default());
        };

        let invalid = || ServerError::InvalidTlsVersion {
            value: raw.to_string(),
        };
        let code: u16 = raw.parse().map_err(|_| invalid())?;

        match code {
            TLS_1_0 | TLS_1_1 => {
                warn!(
                    requested = code,
                    "TLS versions below 1.2 are not offered, using TLS 1.2"
                );
                Ok(Self::Tls12)
            }
            TLS_1_2 => Ok(Self::Tls12),
            TLS_1_3 => Ok(Self::Tls13),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for TlsMinVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tls12 => f.write_str("TLS1.2"),
            Self::Tls13 => f.write_str("TLS1.3"),
        }
    }
}

/// Source of server-side TLS configuration.
pub trait CertificateProvisioner: Send + Sync + 'static {
    /// Build a server configuration restricted to `min_version` and newer.
    fn server_config(&self, min_version: TlsMinVersion) -> Result<rustls::ServerConfig, ServerError>;
}

//! Self-Signed Certificates for Secure Scrape Endpoints
//!
//! Generates a fresh key pair and certificate every time a secure
//! server starts. Scrapers are expected to skip verification or pin
//! the certificate out of band.

use std::sync::Arc;

use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::version::{TLS12, TLS13};
use rustls::{ServerConfig, SupportedProtocolVersion};
use tracing::{info, instrument};

use crate::error::ServerError;
use crate::ports::tls::{CertificateProvisioner, TlsMinVersion};

/// Provisioner backed by `rcgen` and the `ring` crypto provider.
#[derive(Debug, Clone)]
pub struct SelfSignedProvisioner {
    /// Subject alternative names on the generated certificate.
    subject_alt_names: Vec<String>,
}

impl Default for SelfSignedProvisioner {
    fn default() -> Self {
        Self::new(vec!["localhost".to_string()])
    }
}

impl SelfSignedProvisioner {
    pub fn new(subject_alt_names: Vec<String>) -> Self {
        Self { subject_alt_names }
    }
}

static TLS12_AND_NEWER: &[&SupportedProtocolVersion] = &[&TLS13, &TLS12];
static TLS13_ONLY: &[&SupportedProtocolVersion] = &[&TLS13];

fn protocol_versions(min_version: TlsMinVersion) -> &'static [&'static SupportedProtocolVersion] {
    match min_version {
        TlsMinVersion::Tls12 => TLS12_AND_NEWER,
        TlsMinVersion::Tls13 => TLS13_ONLY,
    }
}

impl CertificateProvisioner for SelfSignedProvisioner {
    #[instrument(skip(self))]
    fn server_config(&self, min_version: TlsMinVersion) -> Result<ServerConfig, ServerError> {
        info!("Generating self-signed TLS certificate for telemetry servers");

        let certified = rcgen::generate_simple_self_signed(self.subject_alt_names.clone())?;
        let cert = certified.cert.der().clone();
        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(
            certified.key_pair.serialize_der(),
        ));

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let mut config = ServerConfig::builder_with_provider(provider)
            .with_protocol_versions(protocol_versions(min_version))?
            .with_no_client_auth()
            .with_single_cert(vec![cert], key)?;
        config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

        Ok(config)
    }
}

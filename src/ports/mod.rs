//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) the serving layer requires from the
//! outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `CertificateProvisioner`: TLS material for secure endpoints

pub mod tls;

pub use tls::{CertificateProvisioner, TlsMinVersion};

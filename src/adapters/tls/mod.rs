//! TLS Adapters
//!
//! Concrete `CertificateProvisioner` implementations.

pub mod self_signed;

pub use self_signed::SelfSignedProvisioner;

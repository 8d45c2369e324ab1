//! X.509 engine for certmgr.
//!
//! This crate knows how to make keys, turn request fields into certificate
//! extensions, sign certificates and read them back. It has no notion of
//! storage, namespaces or certificate ids; `certmgr-service` drives it.
//!
//! # Example
//!
//! ```
//! use certmgr_pki::{
//!     CertUsage, CertificateTemplate, ExtensionProfile, KeySpec, Parent, Subject, keygen, sign,
//!     verify_issued_by,
//! };
//!
//! let root_key = keygen::generate(&KeySpec::from_request("ECDSA", 0, "P256").unwrap()).unwrap();
//! let root_template = CertificateTemplate::new(
//!     Subject::common_name("Acme Root"),
//!     ExtensionProfile::for_usage(CertUsage::Ca),
//!     3650,
//! )
//! .unwrap();
//! let root = sign(&root_template, root_key.signing_key(), Parent::SelfSigned).unwrap();
//!
//! let leaf_key = keygen::generate(&KeySpec::Ed25519).unwrap();
//! let leaf_template = CertificateTemplate::new(
//!     Subject::common_name("www.acme.test"),
//!     ExtensionProfile::for_usage(CertUsage::Server),
//!     365,
//! )
//! .unwrap()
//! .with_sans(vec!["www.acme.test".into()], Vec::new());
//! let leaf = sign(
//!     &leaf_template,
//!     leaf_key.signing_key(),
//!     Parent::Issuer { certificate: &root, key: root_key.signing_key() },
//! )
//! .unwrap();
//!
//! verify_issued_by(&leaf, &root).unwrap();
//! assert!(leaf.pem().starts_with("-----BEGIN CERTIFICATE-----"));
//! ```
//!
//! # Modules
//!
//! - [`keygen`] - RSA, ECDSA and Ed25519 key generation
//! - [`key`] - signing keys across the rcgen and P-224 backends
//! - [`profile`] - subject names, usage-derived extensions and SANs
//! - [`signer`] - issuance and renewal signing
//! - [`certificate`] - decoded certificates, private keys, PEM
//! - [`validation`] - signature and chain checks
//! - [`types`] - request-level enums and flag groups
//! - [`error`] - Error types

#![forbid(unsafe_code)]

pub mod certificate;
mod encoder;
pub mod error;
pub mod key;
pub mod keygen;
pub mod profile;
pub mod signer;
pub mod types;
pub mod validation;

pub use certificate::{Certificate, PrivateKey, PublicKeyInfo};
pub use error::{Error, Result};
pub use key::SigningKey;
pub use keygen::GeneratedKey;
pub use profile::{ExtensionProfile, parse_ip_addresses};
pub use signer::{CertificateTemplate, Parent, sign};
pub use types::{
    BasicConstraints, CertUsage, EcCurve, ExtKeyUsageFlags, KeyAlgorithm, KeySpec,
    KeyUsageFlags, Subject,
};
pub use validation::{validate_chain, verify_issued_by};

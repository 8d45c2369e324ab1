//! Error types for certificate lifecycle operations.

use std::fmt;

use certmgr_store::{CertificateId, NamespaceId, StoreError};
use thiserror::Error;

/// The issuance step a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Building the new private key.
    KeyGeneration,
    /// Finding and decoding the issuer, or checking the root slot.
    ParentResolution,
    /// Producing the signed certificate.
    Signing,
    /// Writing to or reading from the record store.
    Persistence,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::KeyGeneration => "key generation",
            Self::ParentResolution => "parent resolution",
            Self::Signing => "signing",
            Self::Persistence => "persistence",
        })
    }
}

/// Errors surfaced by the lifecycle services.
#[derive(Debug, Error)]
pub enum Error {
    /// Key type is not RSA, ECDSA or ED25519.
    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),

    /// Curve name is not P224, P256, P384 or P521.
    #[error("unsupported elliptic curve: {0}")]
    UnsupportedCurve(String),

    /// Request fields failed validation.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The namespace already has a self-signed root.
    #[error("namespace {namespace_id} already has a root certificate")]
    DuplicateRoot {
        /// Namespace holding the existing root.
        namespace_id: NamespaceId,
    },

    /// The referenced issuer does not exist.
    #[error("issuer certificate {0} not found")]
    IssuerNotFound(CertificateId),

    /// The referenced issuer is not allowed to sign certificates.
    #[error("issuer certificate {0} is not a CA")]
    IssuerNotCa(CertificateId),

    /// Stored PEM could not be decoded.
    #[error("certificate {id}: stored PEM is unreadable: {reason}")]
    PemDecode {
        /// Row whose PEM failed to decode.
        id: CertificateId,
        /// Decoder message.
        reason: String,
        /// Issuance phase the decode ran in, if any.
        phase: Option<Phase>,
    },

    /// Key pair generation failed.
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// Certificate construction or signing failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// A namespace or certificate id does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// `"namespace"` or `"certificate"`.
        entity: &'static str,
        /// Requested id.
        id: i64,
    },

    /// Namespace name taken, or the namespace still owns certificates.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The record store failed.
    #[error("store operation {op} failed{}: {source}", fmt_id(.id))]
    Store {
        /// Operation that was running.
        op: &'static str,
        /// Row the operation targeted, if any.
        id: Option<i64>,
        /// Underlying store error.
        #[source]
        source: StoreError,
        /// Issuance phase the operation ran in, if any.
        phase: Option<Phase>,
    },

    /// The caller went away before the operation finished.
    #[error("operation {op} was canceled")]
    Canceled {
        /// Operation that observed the cancellation.
        op: &'static str,
    },

    /// Traversal exceeded its depth or size limit.
    #[error("certificate chain at {id} exceeds traversal limit {limit}")]
    ChainTooDeep {
        /// Certificate where the limit was hit.
        id: CertificateId,
        /// The limit that was exceeded.
        limit: usize,
    },

    /// Traversal reached a certificate twice.
    #[error("issuer cycle detected at certificate {id}")]
    CycleDetected {
        /// Certificate that was revisited.
        id: CertificateId,
    },

    /// Writing the export archive failed.
    #[error("archive error: {0}")]
    Archive(String),
}

#[allow(clippy::ref_option)]
fn fmt_id(id: &Option<i64>) -> String {
    id.map(|id| format!(" for id {id}")).unwrap_or_default()
}

impl Error {
    /// Wraps a store failure with the operation and id it happened in.
    ///
    /// Missing rows become [`Error::NotFound`] and taken names become
    /// [`Error::Conflict`]; everything else is a [`Error::Store`].
    pub fn store(op: &'static str, id: Option<i64>, source: StoreError) -> Self {
        match source {
            StoreError::NotFound { entity, id } => Self::NotFound { entity, id },
            StoreError::DuplicateName(name) => {
                Self::Conflict(format!("namespace name already exists: {name}"))
            }
            source => Self::Store {
                op,
                id,
                source,
                phase: None,
            },
        }
    }

    /// Wraps a PEM decode failure for a stored row.
    pub fn pem_decode(id: CertificateId, err: &certmgr_pki::Error) -> Self {
        Self::PemDecode {
            id,
            reason: err.to_string(),
            phase: None,
        }
    }

    /// Records the issuance phase a store or decode failure happened in.
    ///
    /// Other variants already imply their phase and are returned unchanged.
    #[must_use]
    pub fn in_phase(mut self, phase: Phase) -> Self {
        if let Self::Store { phase: slot, .. } | Self::PemDecode { phase: slot, .. } = &mut self {
            *slot = Some(phase);
        }
        self
    }

    /// Shorthand for a missing certificate.
    pub const fn certificate_not_found(id: CertificateId) -> Self {
        Self::NotFound {
            entity: "certificate",
            id: id.get(),
        }
    }

    /// Shorthand for a missing namespace.
    pub const fn namespace_not_found(id: NamespaceId) -> Self {
        Self::NotFound {
            entity: "namespace",
            id: id.get(),
        }
    }

    /// The issuance phase this error belongs to, if it is an issuance error.
    ///
    /// Store and decode failures report the phase recorded by
    /// [`Error::in_phase`] where they were raised.
    pub const fn phase(&self) -> Option<Phase> {
        match self {
            Self::UnsupportedKeyType(_) | Self::UnsupportedCurve(_) | Self::KeyGeneration(_) => {
                Some(Phase::KeyGeneration)
            }
            Self::DuplicateRoot { .. } | Self::IssuerNotFound(_) | Self::IssuerNotCa(_) => {
                Some(Phase::ParentResolution)
            }
            Self::Signing(_) => Some(Phase::Signing),
            Self::Store { phase, .. } | Self::PemDecode { phase, .. } => *phase,
            _ => None,
        }
    }

    /// Stable machine-readable kind.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::UnsupportedKeyType(_) => "unsupported_key_type",
            Self::UnsupportedCurve(_) => "unsupported_curve",
            Self::InvalidRequest(_) => "invalid_request",
            Self::DuplicateRoot { .. } => "duplicate_root",
            Self::IssuerNotFound(_) => "issuer_not_found",
            Self::IssuerNotCa(_) => "issuer_not_ca",
            Self::PemDecode { .. } => "pem_decode_failure",
            Self::KeyGeneration(_) => "key_generation_failure",
            Self::Signing(_) => "signing_failure",
            Self::NotFound { .. } => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Store { .. } => "store_failure",
            Self::Canceled { .. } => "canceled",
            Self::ChainTooDeep { .. } => "chain_too_deep",
            Self::CycleDetected { .. } => "cycle_detected",
            Self::Archive(_) => "archive_failure",
        }
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        Self::store("transaction", None, err)
    }
}

impl From<certmgr_pki::Error> for Error {
    fn from(err: certmgr_pki::Error) -> Self {
        use certmgr_pki::Error as Pki;
        match err {
            Pki::UnsupportedKeyType(t) => Self::UnsupportedKeyType(t),
            Pki::UnsupportedCurve(c) => Self::UnsupportedCurve(c),
            Pki::KeyGeneration(m) => Self::KeyGeneration(m),
            Pki::Validation(m) | Pki::San(m) => Self::InvalidRequest(m),
            other => Self::Signing(other.to_string()),
        }
    }
}

/// Result type for lifecycle operations.
pub type Result<T> = std::result::Result<T, Error>;

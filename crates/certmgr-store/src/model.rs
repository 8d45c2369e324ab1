//! Stored record types.

use std::fmt;

use certmgr_pki::CertUsage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw row id.
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Returns the raw row id.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

row_id!(
    /// Identifier of a namespace row.
    NamespaceId
);

row_id!(
    /// Identifier of a certificate row.
    CertificateId
);

/// A namespace: a named container owning at most one root certificate tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    /// Row id.
    pub id: NamespaceId,
    /// Unique, non-empty name.
    pub name: String,
    /// Free-form description.
    pub desc: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// Fields for inserting or updating a namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceFields {
    /// Name.
    pub name: String,
    /// Description.
    pub desc: String,
}

/// A stored certificate with its private key.
#[derive(Clone, PartialEq, Eq)]
pub struct CertificateRecord {
    /// Row id.
    pub id: CertificateId,
    /// Owning namespace.
    pub namespace_id: NamespaceId,
    /// Issuing certificate; `None` for a self-signed root.
    pub issuer_id: Option<CertificateId>,
    /// PEM `CERTIFICATE` block.
    pub cert_pem: String,
    /// PEM `PRIVATE KEY` block.
    pub key_pem: String,
    /// Free-form description.
    pub desc: String,
    /// Usage tag recorded at creation.
    pub usage: Option<CertUsage>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl CertificateRecord {
    /// Whether this is the self-signed root of its namespace.
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.issuer_id.is_none()
    }
}

impl fmt::Debug for CertificateRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateRecord")
            .field("id", &self.id)
            .field("namespace_id", &self.namespace_id)
            .field("issuer_id", &self.issuer_id)
            .field("desc", &self.desc)
            .field("usage", &self.usage)
            .field("key_pem", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

/// Fields for inserting a certificate; id and timestamps are assigned by the store.
#[derive(Clone)]
pub struct NewCertificate {
    /// Owning namespace.
    pub namespace_id: NamespaceId,
    /// Issuing certificate; `None` for a root.
    pub issuer_id: Option<CertificateId>,
    /// PEM certificate.
    pub cert_pem: String,
    /// PEM private key.
    pub key_pem: String,
    /// Description.
    pub desc: String,
    /// Usage tag.
    pub usage: Option<CertUsage>,
}

impl fmt::Debug for NewCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewCertificate")
            .field("namespace_id", &self.namespace_id)
            .field("issuer_id", &self.issuer_id)
            .field("usage", &self.usage)
            .finish_non_exhaustive()
    }
}

/// Serde adapter mapping `Option<CertificateId>` to the wire convention
/// where `0` means "no issuer".
pub mod issuer_ref {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::CertificateId;

    /// Serializes `None` as `0`.
    pub fn serialize<S: Serializer>(
        issuer: &Option<CertificateId>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(issuer.map_or(0, CertificateId::get))
    }

    /// Deserializes `0` (or a missing/null field) as `None`.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<CertificateId>, D::Error> {
        let raw = Option::<i64>::deserialize(deserializer)?;
        Ok(raw.filter(|id| *id != 0).map(CertificateId::new))
    }
}

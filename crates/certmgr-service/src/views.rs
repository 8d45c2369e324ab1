//! Request and response shapes exchanged with callers.
//!
//! Field names are camelCase on the wire. Timestamps are unix seconds and an
//! `issuerId` of `0` stands for "self-signed root".

use certmgr_pki::{
    BasicConstraints, CertUsage, Certificate, ExtKeyUsageFlags, KeyUsageFlags, Subject,
};
use certmgr_store::{CertificateId, CertificateRecord, Namespace, NamespaceId, issuer_ref};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Parameters for issuing a new certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCertificateRequest {
    /// Owning namespace.
    pub namespace_id: NamespaceId,
    /// Signing CA; `None` issues a self-signed root.
    #[serde(default, with = "issuer_ref")]
    pub issuer_id: Option<CertificateId>,
    /// `RSA`, `ECDSA` or `ED25519`.
    pub key_type: String,
    /// RSA modulus size in bits.
    #[serde(default)]
    pub key_len: usize,
    /// ECDSA curve name such as `P256`.
    #[serde(default)]
    pub ecc_curve: String,
    /// Validity in calendar days from now.
    pub valid_days: i64,
    /// Free-form description.
    #[serde(default)]
    pub desc: String,
    /// Subject name fields.
    #[serde(default)]
    pub subject: Subject,
    /// Usage tag filling in any extension group left out below.
    #[serde(default, with = "usage_tag")]
    pub usage: Option<CertUsage>,
    /// Explicit key usage bits.
    #[serde(default)]
    pub key_usage: Option<KeyUsageFlags>,
    /// Explicit extended key usage purposes.
    #[serde(default)]
    pub extended_key_usage: Option<ExtKeyUsageFlags>,
    /// Explicit basic constraints.
    #[serde(default)]
    pub basic_constraints: Option<BasicConstraints>,
    /// DNS SANs.
    #[serde(default)]
    pub dns_names: Vec<String>,
    /// IP SANs; entries that do not parse are dropped.
    #[serde(default)]
    pub ip_addresses: Vec<String>,
}

impl CreateCertificateRequest {
    /// A request for an ECDSA P-256 certificate with only usage-derived
    /// extensions.
    #[must_use]
    pub fn new(
        namespace_id: NamespaceId,
        subject: Subject,
        usage: CertUsage,
        valid_days: i64,
    ) -> Self {
        Self {
            namespace_id,
            issuer_id: None,
            key_type: "ECDSA".to_string(),
            key_len: 0,
            ecc_curve: "P256".to_string(),
            valid_days,
            desc: String::new(),
            subject,
            usage: Some(usage),
            key_usage: None,
            extended_key_usage: None,
            basic_constraints: None,
            dns_names: Vec::new(),
            ip_addresses: Vec::new(),
        }
    }

    /// Signs with `issuer` instead of self-signing.
    #[must_use]
    pub const fn issued_by(mut self, issuer: CertificateId) -> Self {
        self.issuer_id = Some(issuer);
        self
    }

    /// Sets the key algorithm parameters.
    #[must_use]
    pub fn with_key(mut self, key_type: &str, key_len: usize, ecc_curve: &str) -> Self {
        self.key_type = key_type.to_string();
        self.key_len = key_len;
        self.ecc_curve = ecc_curve.to_string();
        self
    }

    /// Sets the DNS SANs.
    #[must_use]
    pub fn with_dns_names(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.dns_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the IP SANs.
    #[must_use]
    pub fn with_ip_addresses(
        mut self,
        addresses: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.ip_addresses = addresses.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = desc.into();
        self
    }
}

/// Empty or missing usage strings mean "no usage tag".
mod usage_tag {
    use certmgr_pki::CertUsage;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        usage: &Option<CertUsage>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        usage.map_or("", |u| u.as_str()).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<CertUsage>, D::Error> {
        match Option::<String>::deserialize(deserializer)?.as_deref() {
            None | Some("") => Ok(None),
            Some(tag) => tag.parse().map(Some).map_err(D::Error::custom),
        }
    }
}

/// A certificate as returned by create and renew, including its PEM blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateView {
    /// Row id.
    pub id: CertificateId,
    /// Owning namespace.
    pub namespace_id: NamespaceId,
    /// Signing CA, `0` on the wire for a root.
    #[serde(with = "issuer_ref")]
    pub issuer_id: Option<CertificateId>,
    /// Description.
    pub desc: String,
    /// Rendered subject, e.g. `C=US, O=Acme, CN=www.acme.test`.
    pub subject: String,
    /// Basic constraints CA flag.
    #[serde(rename = "isCA")]
    pub is_ca: bool,
    /// Usage tag.
    #[serde(with = "usage_tag")]
    pub usage: Option<CertUsage>,
    /// PEM certificate.
    pub cert_pem: String,
    /// PEM private key.
    pub key_pem: String,
    /// Creation time.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub updated_at: DateTime<Utc>,
}

impl CertificateView {
    pub(crate) fn new(record: CertificateRecord, cert: &Certificate) -> Self {
        Self {
            id: record.id,
            namespace_id: record.namespace_id,
            issuer_id: record.issuer_id,
            desc: record.desc,
            subject: cert.subject().to_string(),
            is_ca: cert.is_ca(),
            usage: record.usage,
            cert_pem: record.cert_pem,
            key_pem: record.key_pem,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// One row of a namespace listing. Key material is left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateSummary {
    /// Row id.
    pub id: CertificateId,
    /// Owning namespace.
    pub namespace_id: NamespaceId,
    /// Signing CA, `0` on the wire for a root.
    #[serde(with = "issuer_ref")]
    pub issuer_id: Option<CertificateId>,
    /// Description.
    pub desc: String,
    /// Rendered subject.
    pub subject: String,
    /// Basic constraints CA flag.
    #[serde(rename = "isCA")]
    pub is_ca: bool,
    /// Usage tag.
    #[serde(with = "usage_tag")]
    pub usage: Option<CertUsage>,
    /// Creation time.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub updated_at: DateTime<Utc>,
}

impl CertificateSummary {
    pub(crate) fn new(record: CertificateRecord, cert: &Certificate) -> Self {
        Self {
            id: record.id,
            namespace_id: record.namespace_id,
            issuer_id: record.issuer_id,
            desc: record.desc,
            subject: cert.subject().to_string(),
            is_ca: cert.is_ca(),
            usage: record.usage,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Everything known about one certificate, re-derived from its PEM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateDetail {
    /// Row id.
    pub id: CertificateId,
    /// Owning namespace.
    pub namespace_id: NamespaceId,
    /// Signing CA, `0` on the wire for a root.
    #[serde(with = "issuer_ref")]
    pub issuer_id: Option<CertificateId>,
    /// Description.
    pub desc: String,
    /// Rendered subject.
    pub subject: String,
    /// Rendered subject of the issuer; the own subject for a root.
    pub issuer_subject: String,
    /// Serial number in lowercase hex.
    pub serial: String,
    /// `RSA`, `ECDSA` or `ED25519`.
    pub key_type: String,
    /// RSA modulus size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_len: Option<usize>,
    /// ECDSA curve.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ecc_curve: Option<String>,
    /// Whole days between `notBefore` and `notAfter`.
    pub valid_days: i64,
    /// Validity start.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub not_before: DateTime<Utc>,
    /// Validity end.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub not_after: DateTime<Utc>,
    /// Key usage names, e.g. `digitalSignature`.
    pub key_usage: Vec<String>,
    /// Extended key usage names, e.g. `serverAuth`.
    pub ext_key_usage: Vec<String>,
    /// DNS SANs.
    pub dns_names: Vec<String>,
    /// IP SANs.
    pub ip_addresses: Vec<String>,
    /// Basic constraints CA flag.
    #[serde(rename = "isCA")]
    pub is_ca: bool,
    /// Usage tag.
    #[serde(with = "usage_tag")]
    pub usage: Option<CertUsage>,
    /// PEM certificate.
    pub cert_pem: String,
    /// PEM private key.
    pub key_pem: String,
    /// Creation time.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted when creating or updating a namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceRequest {
    /// Name, unique across the service.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub desc: String,
}

impl NamespaceRequest {
    /// Creates a request.
    #[must_use]
    pub fn new(name: impl Into<String>, desc: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            desc: desc.into(),
        }
    }
}

/// A namespace with the number of certificates it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceView {
    /// Row id.
    pub id: NamespaceId,
    /// Name.
    pub name: String,
    /// Description.
    pub desc: String,
    /// Certificates owned.
    pub cert_count: usize,
    /// Creation time.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub updated_at: DateTime<Utc>,
}

impl NamespaceView {
    pub(crate) fn new(namespace: Namespace, cert_count: usize) -> Self {
        Self {
            id: namespace.id,
            name: namespace.name,
            desc: namespace.desc,
            cert_count,
            created_at: namespace.created_at,
            updated_at: namespace.updated_at,
        }
    }
}

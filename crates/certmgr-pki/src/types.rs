//! Core PKI types shared by key generation, signing and decoding.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Public key algorithm family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyAlgorithm {
    /// RSA with a caller-chosen modulus size.
    #[serde(rename = "RSA")]
    Rsa,
    /// ECDSA over a named NIST curve.
    #[serde(rename = "ECDSA")]
    Ecdsa,
    /// Ed25519.
    #[serde(rename = "ED25519")]
    Ed25519,
}

impl KeyAlgorithm {
    /// Returns the wire name of the algorithm.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Rsa => "RSA",
            Self::Ecdsa => "ECDSA",
            Self::Ed25519 => "ED25519",
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "RSA" => Ok(Self::Rsa),
            "ECDSA" => Ok(Self::Ecdsa),
            "ED25519" => Ok(Self::Ed25519),
            other => Err(Error::UnsupportedKeyType(other.to_string())),
        }
    }
}

/// Named elliptic curve for ECDSA keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EcCurve {
    /// NIST P-224.
    P224,
    /// NIST P-256.
    P256,
    /// NIST P-384.
    P384,
    /// NIST P-521.
    P521,
}

impl EcCurve {
    /// Returns the curve name as used in requests and detail views.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::P224 => "P224",
            Self::P256 => "P256",
            Self::P384 => "P384",
            Self::P521 => "P521",
        }
    }

    /// Returns the named-curve OID.
    #[must_use]
    pub const fn oid(&self) -> &'static str {
        match self {
            Self::P224 => "1.3.132.0.33",
            Self::P256 => "1.2.840.10045.3.1.7",
            Self::P384 => "1.3.132.0.34",
            Self::P521 => "1.3.132.0.35",
        }
    }

    /// Looks up a curve by its named-curve OID.
    #[must_use]
    pub fn from_oid(oid: &str) -> Option<Self> {
        [Self::P224, Self::P256, Self::P384, Self::P521]
            .into_iter()
            .find(|curve| curve.oid() == oid)
    }
}

impl fmt::Display for EcCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EcCurve {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "P224" => Ok(Self::P224),
            "P256" => Ok(Self::P256),
            "P384" => Ok(Self::P384),
            "P521" => Ok(Self::P521),
            other => Err(Error::UnsupportedCurve(other.to_string())),
        }
    }
}

/// A fully resolved key generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySpec {
    /// RSA key with the given modulus size in bits.
    Rsa {
        /// Modulus size in bits.
        bits: usize,
    },
    /// ECDSA key on the given curve.
    Ecdsa(EcCurve),
    /// Ed25519 key.
    Ed25519,
}

impl KeySpec {
    /// Resolves the loosely-typed request triple into a key spec.
    ///
    /// `bits` only matters for RSA and `curve` only for ECDSA; the other
    /// field is ignored.
    pub fn from_request(key_type: &str, bits: usize, curve: &str) -> Result<Self> {
        match key_type.parse::<KeyAlgorithm>()? {
            KeyAlgorithm::Rsa => Ok(Self::Rsa { bits }),
            KeyAlgorithm::Ecdsa => Ok(Self::Ecdsa(curve.parse()?)),
            KeyAlgorithm::Ed25519 => Ok(Self::Ed25519),
        }
    }

    /// Returns the algorithm family.
    #[must_use]
    pub const fn algorithm(&self) -> KeyAlgorithm {
        match self {
            Self::Rsa { .. } => KeyAlgorithm::Rsa,
            Self::Ecdsa(_) => KeyAlgorithm::Ecdsa,
            Self::Ed25519 => KeyAlgorithm::Ed25519,
        }
    }
}

/// Intended purpose of a certificate, used to fill in missing extension groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CertUsage {
    /// Certificate authority.
    #[serde(rename = "CA")]
    Ca,
    /// TLS server.
    #[serde(rename = "server")]
    Server,
    /// TLS client.
    #[serde(rename = "client")]
    Client,
    /// Code signing.
    #[serde(rename = "code")]
    Code,
}

impl CertUsage {
    /// Returns the wire tag.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ca => "CA",
            Self::Server => "server",
            Self::Client => "client",
            Self::Code => "code",
        }
    }
}

impl fmt::Display for CertUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CertUsage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "CA" => Ok(Self::Ca),
            "server" => Ok(Self::Server),
            "client" => Ok(Self::Client),
            "code" => Ok(Self::Code),
            other => Err(Error::Validation(format!("unknown certificate usage: {other}"))),
        }
    }
}

/// X.509 key usage bits this service understands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeyUsageFlags {
    /// `digitalSignature`
    pub digital_signature: bool,
    /// `keyEncipherment`
    pub key_encipherment: bool,
    /// `keyCertSign`
    pub key_cert_sign: bool,
    /// `cRLSign`
    #[serde(rename = "cRLSign")]
    pub crl_sign: bool,
}

impl KeyUsageFlags {
    /// Returns the names of the set bits in canonical order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        [
            (self.digital_signature, "digitalSignature"),
            (self.key_encipherment, "keyEncipherment"),
            (self.key_cert_sign, "keyCertSign"),
            (self.crl_sign, "cRLSign"),
        ]
        .into_iter()
        .filter_map(|(set, name)| set.then_some(name))
        .collect()
    }

    /// Returns true when no bit is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !(self.digital_signature || self.key_encipherment || self.key_cert_sign || self.crl_sign)
    }
}

/// Extended key usage purposes this service understands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtKeyUsageFlags {
    /// TLS server authentication.
    pub server_auth: bool,
    /// TLS client authentication.
    pub client_auth: bool,
    /// Code signing.
    pub code_signing: bool,
}

impl ExtKeyUsageFlags {
    /// Returns the names of the set purposes in canonical order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        [
            (self.server_auth, "serverAuth"),
            (self.client_auth, "clientAuth"),
            (self.code_signing, "codeSigning"),
        ]
        .into_iter()
        .filter_map(|(set, name)| set.then_some(name))
        .collect()
    }

    /// Returns true when no purpose is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !(self.server_auth || self.client_auth || self.code_signing)
    }
}

/// Basic constraints request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicConstraints {
    /// Whether the certificate may sign other certificates.
    pub ca: bool,
}

/// Subject distinguished name components.
///
/// `None` omits the component entirely. `Some("")` is kept and encoded as a
/// zero-length value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    /// Country (`C`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// State or province (`ST`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Locality (`L`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// Organization (`O`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,
    /// Organizational unit (`OU`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ou: Option<String>,
    /// Common name (`CN`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common_name: Option<String>,
}

impl Subject {
    /// Creates a subject with only a common name.
    #[must_use]
    pub fn common_name(cn: impl Into<String>) -> Self {
        Self {
            common_name: Some(cn.into()),
            ..Self::default()
        }
    }

    /// Returns the present components in `C, ST, L, O, OU, CN` order.
    #[must_use]
    pub fn components(&self) -> Vec<(&'static str, &str)> {
        [
            ("C", &self.country),
            ("ST", &self.state),
            ("L", &self.city),
            ("O", &self.org),
            ("OU", &self.ou),
            ("CN", &self.common_name),
        ]
        .into_iter()
        .filter_map(|(label, value)| value.as_deref().map(|v| (label, v)))
        .collect()
    }
}

impl fmt::Display for Subject {
    /// Renders as `C=.., ST=.., L=.., O=.., OU=.., CN=..`, skipping absent parts.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (label, value)) in self.components().into_iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{label}={value}")?;
        }
        Ok(())
    }
}

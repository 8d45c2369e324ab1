//! Decoded certificates, private keys and their PEM codecs.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use x509_parser::prelude::*;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};
use crate::key::SigningKey;
use crate::types::{EcCurve, ExtKeyUsageFlags, KeyAlgorithm, KeyUsageFlags, Subject};

const CERTIFICATE_LABEL: &str = "CERTIFICATE";
const PRIVATE_KEY_LABEL: &str = "PRIVATE KEY";

const OID_RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";
const OID_EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";
const OID_ED25519: &str = "1.3.101.112";

/// Public key parameters recovered from a certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKeyInfo {
    /// RSA key with the modulus bit length.
    Rsa {
        /// Modulus size in bits.
        bits: usize,
    },
    /// EC key; `curve` is `None` for curves this service does not name.
    Ecdsa {
        /// Named curve, when recognized.
        curve: Option<EcCurve>,
    },
    /// Ed25519 key.
    Ed25519,
    /// Anything else, identified by its algorithm OID.
    Unknown {
        /// Dotted algorithm OID.
        oid: String,
    },
}

impl PublicKeyInfo {
    /// Algorithm family, when it is one this service issues.
    #[must_use]
    pub const fn algorithm(&self) -> Option<KeyAlgorithm> {
        match self {
            Self::Rsa { .. } => Some(KeyAlgorithm::Rsa),
            Self::Ecdsa { .. } => Some(KeyAlgorithm::Ecdsa),
            Self::Ed25519 => Some(KeyAlgorithm::Ed25519),
            Self::Unknown { .. } => None,
        }
    }

    /// RSA modulus size; `None` for every other algorithm.
    #[must_use]
    pub const fn rsa_bits(&self) -> Option<usize> {
        match self {
            Self::Rsa { bits } => Some(*bits),
            _ => None,
        }
    }

    /// ECDSA curve; `None` for every other algorithm.
    #[must_use]
    pub const fn curve(&self) -> Option<EcCurve> {
        match self {
            Self::Ecdsa { curve } => *curve,
            _ => None,
        }
    }
}

/// A DER-encoded X.509 certificate with the fields this service reads back.
#[derive(Debug, Clone)]
pub struct Certificate {
    der: Vec<u8>,
    serial: Vec<u8>,
    subject: Subject,
    issuer: Subject,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    is_ca: bool,
    key_usage: KeyUsageFlags,
    ext_key_usage: ExtKeyUsageFlags,
    dns_names: Vec<String>,
    ip_addresses: Vec<IpAddr>,
    public_key: PublicKeyInfo,
}

impl Certificate {
    /// Parses a certificate from DER-encoded bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| Error::Parse(format!("failed to parse certificate: {e}")))?;

        let not_before = DateTime::from_timestamp(cert.validity().not_before.timestamp(), 0)
            .ok_or_else(|| Error::Parse("invalid not_before timestamp".into()))?;
        let not_after = DateTime::from_timestamp(cert.validity().not_after.timestamp(), 0)
            .ok_or_else(|| Error::Parse("invalid not_after timestamp".into()))?;

        let is_ca = cert
            .basic_constraints()
            .map_err(|e| Error::Parse(format!("basic constraints: {e}")))?
            .is_some_and(|bc| bc.value.ca);

        let key_usage = cert
            .key_usage()
            .map_err(|e| Error::Parse(format!("key usage: {e}")))?
            .map(|ku| KeyUsageFlags {
                digital_signature: ku.value.digital_signature(),
                key_encipherment: ku.value.key_encipherment(),
                key_cert_sign: ku.value.key_cert_sign(),
                crl_sign: ku.value.crl_sign(),
            })
            .unwrap_or_default();

        let ext_key_usage = cert
            .extended_key_usage()
            .map_err(|e| Error::Parse(format!("extended key usage: {e}")))?
            .map(|eku| ExtKeyUsageFlags {
                server_auth: eku.value.server_auth,
                client_auth: eku.value.client_auth,
                code_signing: eku.value.code_signing,
            })
            .unwrap_or_default();

        let (dns_names, ip_addresses) = extract_san(&cert);

        Ok(Self {
            der: der.to_vec(),
            serial: cert.raw_serial().to_vec(),
            subject: extract_subject(cert.subject())?,
            issuer: extract_subject(cert.issuer())?,
            not_before,
            not_after,
            is_ca,
            key_usage,
            ext_key_usage,
            dns_names,
            ip_addresses,
            public_key: extract_public_key(cert.public_key()),
        })
    }

    /// Decodes a PEM `CERTIFICATE` block.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PemDecode`] when there is no PEM block, the label is
    /// wrong, or the DER inside does not parse.
    pub fn from_pem(pem: &str) -> Result<Self> {
        let der = decode_pem(pem, CERTIFICATE_LABEL)?;
        Self::from_der(&der).map_err(|e| Error::PemDecode(e.to_string()))
    }

    /// Returns the DER-encoded certificate bytes.
    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Returns the PEM-encoded certificate.
    #[must_use]
    pub fn pem(&self) -> String {
        encode_pem(CERTIFICATE_LABEL, &self.der)
    }

    /// Raw big-endian serial number bytes.
    #[must_use]
    pub fn serial(&self) -> &[u8] {
        &self.serial
    }

    /// Serial number as lowercase hex without leading zeros.
    #[must_use]
    pub fn serial_hex(&self) -> String {
        let hex: String = self.serial.iter().map(|b| format!("{b:02x}")).collect();
        match hex.trim_start_matches('0') {
            "" => "0".to_string(),
            digits => digits.to_string(),
        }
    }

    /// Returns the subject name.
    #[must_use]
    pub const fn subject(&self) -> &Subject {
        &self.subject
    }

    /// Returns the issuer name.
    #[must_use]
    pub const fn issuer(&self) -> &Subject {
        &self.issuer
    }

    /// Returns the certificate validity start time.
    #[must_use]
    pub const fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    /// Returns the certificate validity end time.
    #[must_use]
    pub const fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    /// Whole days between `not_before` and `not_after`.
    #[must_use]
    pub fn valid_days(&self) -> i64 {
        (self.not_after - self.not_before).num_days()
    }

    /// Whether basic constraints mark this certificate as a CA.
    #[must_use]
    pub const fn is_ca(&self) -> bool {
        self.is_ca
    }

    /// Key usage bits.
    #[must_use]
    pub const fn key_usage(&self) -> KeyUsageFlags {
        self.key_usage
    }

    /// Extended key usage purposes.
    #[must_use]
    pub const fn ext_key_usage(&self) -> ExtKeyUsageFlags {
        self.ext_key_usage
    }

    /// DNS subject alternative names.
    #[must_use]
    pub fn dns_names(&self) -> &[String] {
        &self.dns_names
    }

    /// IP subject alternative names.
    #[must_use]
    pub fn ip_addresses(&self) -> &[IpAddr] {
        &self.ip_addresses
    }

    /// Public key parameters.
    #[must_use]
    pub const fn public_key(&self) -> &PublicKeyInfo {
        &self.public_key
    }
}

/// A PKCS#8 private key with secure memory handling.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey {
    der: Vec<u8>,
}

impl PrivateKey {
    /// Creates a new private key from PKCS#8 DER bytes.
    #[must_use]
    pub const fn new(der: Vec<u8>) -> Self {
        Self { der }
    }

    /// Decodes a PEM `PRIVATE KEY` block.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PemDecode`] when there is no PEM block or the label is wrong.
    pub fn from_pem(pem: &str) -> Result<Self> {
        decode_pem(pem, PRIVATE_KEY_LABEL).map(Self::new)
    }

    /// Returns the DER-encoded private key bytes.
    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Returns the PEM-encoded private key.
    #[must_use]
    pub fn pem(&self) -> String {
        encode_pem(PRIVATE_KEY_LABEL, &self.der)
    }

    /// Loads the key into a signing handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PemDecode`] if the bytes are not a supported PKCS#8 key.
    pub fn signing_key(&self) -> Result<SigningKey> {
        SigningKey::from_pkcs8_der(&self.der)
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKey")
            .field("der", &"[REDACTED]")
            .finish()
    }
}

impl Clone for PrivateKey {
    fn clone(&self) -> Self {
        Self {
            der: self.der.clone(),
        }
    }
}

fn encode_pem(label: &str, der: &[u8]) -> String {
    use base64::Engine;
    let b64 = base64::engine::general_purpose::STANDARD.encode(der);
    format!(
        "-----BEGIN {label}-----\n{}\n-----END {label}-----\n",
        b64.as_bytes()
            .chunks(64)
            .map(|chunk| std::str::from_utf8(chunk).unwrap_or(""))
            .collect::<Vec<_>>()
            .join("\n")
    )
}

fn decode_pem(pem: &str, label: &str) -> Result<Vec<u8>> {
    let (_, block) = x509_parser::pem::parse_x509_pem(pem.as_bytes())
        .map_err(|e| Error::PemDecode(format!("no {label} PEM block: {e}")))?;
    if block.label != label {
        return Err(Error::PemDecode(format!(
            "expected {label} PEM block, found {}",
            block.label
        )));
    }
    Ok(block.contents)
}

/// Collects the first value of each supported attribute.
fn extract_subject(name: &X509Name<'_>) -> Result<Subject> {
    fn first<'a, 'b: 'a>(
        mut values: impl Iterator<Item = &'a AttributeTypeAndValue<'b>>,
    ) -> Result<Option<String>> {
        values
            .next()
            .map(|attr| {
                attr.as_str()
                    .map(String::from)
                    .map_err(|e| Error::Parse(format!("failed to parse name attribute: {e}")))
            })
            .transpose()
    }

    Ok(Subject {
        country: first(name.iter_country())?,
        state: first(name.iter_state_or_province())?,
        city: first(name.iter_locality())?,
        org: first(name.iter_organization())?,
        ou: first(name.iter_organizational_unit())?,
        common_name: first(name.iter_common_name())?,
    })
}

/// Extracts DNS and IP SANs from a certificate.
fn extract_san(cert: &X509Certificate<'_>) -> (Vec<String>, Vec<IpAddr>) {
    let mut dns_names = Vec::new();
    let mut ip_addresses = Vec::new();

    if let Ok(Some(san_ext)) = cert.subject_alternative_name() {
        for name in &san_ext.value.general_names {
            match name {
                GeneralName::DNSName(dns) => dns_names.push((*dns).to_string()),
                GeneralName::IPAddress(ip_bytes) => {
                    if let Some(ip) = parse_ip_bytes(ip_bytes) {
                        ip_addresses.push(ip);
                    }
                }
                _ => {}
            }
        }
    }

    (dns_names, ip_addresses)
}

/// Parses IP address bytes into an `IpAddr`.
fn parse_ip_bytes(bytes: &[u8]) -> Option<IpAddr> {
    match bytes.len() {
        4 => {
            let octets: [u8; 4] = bytes.try_into().ok()?;
            Some(IpAddr::from(octets))
        }
        16 => {
            let octets: [u8; 16] = bytes.try_into().ok()?;
            Some(IpAddr::from(octets))
        }
        _ => None,
    }
}

fn extract_public_key(spki: &SubjectPublicKeyInfo<'_>) -> PublicKeyInfo {
    let oid = spki.algorithm.algorithm.to_id_string();
    match oid.as_str() {
        OID_RSA_ENCRYPTION => {
            let bits = match spki.parsed() {
                Ok(x509_parser::public_key::PublicKey::RSA(rsa)) => modulus_bits(rsa.modulus),
                _ => 0,
            };
            PublicKeyInfo::Rsa { bits }
        }
        OID_EC_PUBLIC_KEY => {
            let curve = spki
                .algorithm
                .parameters
                .as_ref()
                .and_then(|params| params.as_oid().ok())
                .and_then(|curve_oid| EcCurve::from_oid(&curve_oid.to_id_string()));
            PublicKeyInfo::Ecdsa { curve }
        }
        OID_ED25519 => PublicKeyInfo::Ed25519,
        _ => PublicKeyInfo::Unknown { oid },
    }
}

/// Bit length of a big-endian unsigned integer.
fn modulus_bits(modulus: &[u8]) -> usize {
    match modulus.iter().position(|b| *b != 0) {
        Some(start) => (modulus.len() - start) * 8 - modulus[start].leading_zeros() as usize,
        None => 0,
    }
}

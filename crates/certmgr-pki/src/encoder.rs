//! Certificates encoded field by field with `x509-cert`.
//!
//! rcgen writes the subject key's algorithm identifiers from its own table,
//! which has no P-224 entry. Whenever the subject or the signer is a P-224
//! key the signer builds the `TBSCertificate` here and signs its DER with
//! [`SigningKey::sign`]. Names, extensions and their order follow what rcgen
//! emits so both paths produce interchangeable certificates.

use std::net::IpAddr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use const_oid::ObjectIdentifier;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::certificate::{TbsCertificate, Version};
use x509_cert::der::asn1::{BitString, GeneralizedTime, Ia5String, OctetString, SetOfVec, UtcTime};
use x509_cert::der::{Any, Decode, Encode, Tag};
use x509_cert::ext::Extension;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::{BasicConstraints, ExtendedKeyUsage, SubjectAltName};
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::SubjectPublicKeyInfoOwned;
use x509_cert::time::{Time, Validity};

use crate::certificate::Certificate;
use crate::error::{Error, Result};
use crate::key::SigningKey;
use crate::profile::ExtensionProfile;
use crate::signer::{CertificateTemplate, Parent};
use crate::types::Subject;

const COUNTRY: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.6");
const STATE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.8");
const LOCALITY: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.7");
const ORGANIZATION: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.10");
const ORGANIZATIONAL_UNIT: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.11");
const COMMON_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");

const SUBJECT_KEY_IDENTIFIER: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.14");
const KEY_USAGE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.15");
const SUBJECT_ALT_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.17");
const BASIC_CONSTRAINTS: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.19");
const EXT_KEY_USAGE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.37");

const SERVER_AUTH: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.1");
const CLIENT_AUTH: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.2");
const CODE_SIGNING: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.3");

/// UTCTime covers 1950 through 2049; later dates use GeneralizedTime.
const LAST_UTC_TIME_YEAR: u16 = 2049;

/// Builds and signs a certificate without rcgen.
pub(crate) fn sign(
    template: &CertificateTemplate,
    subject_key: &SigningKey,
    parent: Parent<'_>,
) -> Result<Certificate> {
    let subject = name(&template.subject)?;
    let (issuer, signer) = match parent {
        Parent::SelfSigned => (subject.clone(), subject_key),
        Parent::Issuer { certificate, key } => (subject_name_of(certificate)?, key),
    };

    let subject_public_key_info =
        SubjectPublicKeyInfoOwned::from_der(&subject_key.public_key_der()?).map_err(der_error)?;
    let key_id = key_identifier(subject_public_key_info.subject_public_key.raw_bytes());
    let signature_algorithm = signer.signature_algorithm()?;

    let tbs_certificate = TbsCertificate {
        version: Version::V3,
        serial_number: serial_number(&template.serial)?,
        signature: signature_algorithm.clone(),
        issuer,
        validity: Validity {
            not_before: validity_time(template.not_before)?,
            not_after: validity_time(template.not_after)?,
        },
        subject,
        subject_public_key_info,
        issuer_unique_id: None,
        subject_unique_id: None,
        extensions: Some(extensions(template, key_id)?),
    };

    let tbs_der = tbs_certificate.to_der().map_err(der_error)?;
    let signature = signer.sign(&tbs_der)?;

    let certificate = x509_cert::Certificate {
        tbs_certificate,
        signature_algorithm,
        signature: BitString::from_bytes(&signature).map_err(der_error)?,
    };
    Certificate::from_der(&certificate.to_der().map_err(der_error)?)
}

/// One single-valued RDN per present field, `C, ST, L, O, OU, CN`, as
/// UTF8String.
fn name(subject: &Subject) -> Result<Name> {
    let fields = [
        (COUNTRY, &subject.country),
        (STATE, &subject.state),
        (LOCALITY, &subject.city),
        (ORGANIZATION, &subject.org),
        (ORGANIZATIONAL_UNIT, &subject.ou),
        (COMMON_NAME, &subject.common_name),
    ];

    let mut rdns = Vec::new();
    for (oid, value) in fields {
        let Some(value) = value else { continue };
        let attribute = AttributeTypeAndValue {
            oid,
            value: Any::new(Tag::Utf8String, value.as_bytes()).map_err(der_error)?,
        };
        let set = SetOfVec::try_from(vec![attribute]).map_err(der_error)?;
        rdns.push(RelativeDistinguishedName(set));
    }
    Ok(RdnSequence(rdns))
}

/// The issuer's subject exactly as encoded in its certificate.
fn subject_name_of(certificate: &Certificate) -> Result<Name> {
    x509_cert::Certificate::from_der(certificate.der())
        .map(|cert| cert.tbs_certificate.subject)
        .map_err(|e| Error::Signing(format!("failed to load issuer certificate: {e}")))
}

/// Minimal positive INTEGER encoding of the serial bytes.
fn serial_number(serial: &[u8]) -> Result<SerialNumber> {
    let start = serial.iter().position(|b| *b != 0).unwrap_or(serial.len());
    let mut bytes = serial[start..].to_vec();
    if bytes.first().is_none_or(|b| *b & 0x80 != 0) {
        bytes.insert(0, 0);
    }
    SerialNumber::new(&bytes).map_err(der_error)
}

fn validity_time(at: DateTime<Utc>) -> Result<Time> {
    let secs = u64::try_from(at.timestamp())
        .map_err(|_| Error::Signing(format!("timestamp {at} predates the epoch")))?;
    let date_time =
        x509_cert::der::DateTime::from_unix_duration(Duration::from_secs(secs)).map_err(der_error)?;
    if date_time.year() <= LAST_UTC_TIME_YEAR {
        UtcTime::from_date_time(date_time)
            .map(Time::UtcTime)
            .map_err(der_error)
    } else {
        Ok(Time::GeneralTime(GeneralizedTime::from_date_time(date_time)))
    }
}

fn extensions(template: &CertificateTemplate, key_id: Vec<u8>) -> Result<Vec<Extension>> {
    let profile = &template.profile;
    let mut extensions = Vec::with_capacity(5);

    if !template.dns_names.is_empty() || !template.ip_addresses.is_empty() {
        let sans = subject_alt_names(&template.dns_names, &template.ip_addresses)?;
        extensions.push(extension(SUBJECT_ALT_NAME, false, &sans)?);
    }
    if let Some(bits) = key_usage(profile)? {
        extensions.push(extension(KEY_USAGE, true, &bits)?);
    }
    let purposes = ext_key_usage(profile);
    if !purposes.0.is_empty() {
        extensions.push(extension(EXT_KEY_USAGE, false, &purposes)?);
    }
    let constraints = BasicConstraints {
        ca: profile.is_ca,
        path_len_constraint: None,
    };
    extensions.push(extension(BASIC_CONSTRAINTS, true, &constraints)?);
    let key_id = OctetString::new(key_id).map_err(der_error)?;
    extensions.push(extension(SUBJECT_KEY_IDENTIFIER, false, &key_id)?);

    Ok(extensions)
}

fn extension(oid: ObjectIdentifier, critical: bool, value: &impl Encode) -> Result<Extension> {
    let der = value.to_der().map_err(der_error)?;
    Ok(Extension {
        extn_id: oid,
        critical,
        extn_value: OctetString::new(der).map_err(der_error)?,
    })
}

/// KeyUsage named bits; `None` when no bit is set.
fn key_usage(profile: &ExtensionProfile) -> Result<Option<BitString>> {
    let ku = profile.key_usage;
    let byte = [
        (ku.digital_signature, 0x80_u8),
        (ku.key_encipherment, 0x20),
        (ku.key_cert_sign, 0x04),
        (ku.crl_sign, 0x02),
    ]
    .into_iter()
    .filter(|(set, _)| *set)
    .fold(0, |acc, (_, bit)| acc | bit);

    if byte == 0 {
        return Ok(None);
    }
    // Named bit lists drop trailing zero bits.
    let unused = byte.trailing_zeros() as u8;
    BitString::new(unused, vec![byte]).map(Some).map_err(der_error)
}

fn ext_key_usage(profile: &ExtensionProfile) -> ExtendedKeyUsage {
    let eku = profile.ext_key_usage;
    ExtendedKeyUsage(
        [
            (eku.server_auth, SERVER_AUTH),
            (eku.client_auth, CLIENT_AUTH),
            (eku.code_signing, CODE_SIGNING),
        ]
        .into_iter()
        .filter_map(|(set, oid)| set.then_some(oid))
        .collect(),
    )
}

fn subject_alt_names(dns_names: &[String], ips: &[IpAddr]) -> Result<SubjectAltName> {
    let mut names = Vec::with_capacity(dns_names.len() + ips.len());
    for dns in dns_names {
        let ia5 = Ia5String::new(dns)
            .map_err(|e| Error::San(format!("invalid DNS name '{dns}': {e}")))?;
        names.push(GeneralName::DnsName(ia5));
    }
    for ip in ips {
        let octets = match ip {
            IpAddr::V4(v4) => v4.octets().to_vec(),
            IpAddr::V6(v6) => v6.octets().to_vec(),
        };
        names.push(GeneralName::IpAddress(
            OctetString::new(octets).map_err(der_error)?,
        ));
    }
    Ok(SubjectAltName(names))
}

/// SHA-256 of the public key bits, truncated to 20 bytes.
fn key_identifier(public_key: &[u8]) -> Vec<u8> {
    let digest = aws_lc_rs::digest::digest(&aws_lc_rs::digest::SHA256, public_key);
    digest.as_ref()[..20].to_vec()
}

fn der_error(e: x509_cert::der::Error) -> Error {
    Error::Signing(format!("DER encoding: {e}"))
}

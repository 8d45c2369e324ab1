//! Certificate signing for new issuance and renewal.

use std::net::IpAddr;

use chrono::{DateTime, Days, Utc};
use rand::Rng;
use rand::rngs::OsRng;
use rcgen::{CertificateParams, KeyPair, SerialNumber};
use tracing::debug;

use crate::certificate::Certificate;
use crate::encoder;
use crate::error::{Error, Result};
use crate::key::SigningKey;
use crate::profile::{ExtensionProfile, distinguished_name, subject_alt_names};
use crate::types::Subject;

/// Serial numbers are drawn uniformly from `1..=MAX_SERIAL`.
pub const MAX_SERIAL: u64 = i64::MAX as u64;

/// Everything that goes into a certificate except the keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateTemplate {
    /// Subject name.
    pub subject: Subject,
    /// Extensions.
    pub profile: ExtensionProfile,
    /// DNS SANs.
    pub dns_names: Vec<String>,
    /// IP SANs.
    pub ip_addresses: Vec<IpAddr>,
    /// Big-endian serial number bytes.
    pub serial: Vec<u8>,
    /// Validity start.
    pub not_before: DateTime<Utc>,
    /// Validity end.
    pub not_after: DateTime<Utc>,
}

impl CertificateTemplate {
    /// Creates a template with a fresh random serial valid from now for
    /// `valid_days` calendar days.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the validity window overflows.
    pub fn new(subject: Subject, profile: ExtensionProfile, valid_days: u32) -> Result<Self> {
        let (not_before, not_after) = validity_window(Utc::now(), valid_days)?;
        Ok(Self {
            subject,
            profile,
            dns_names: Vec::new(),
            ip_addresses: Vec::new(),
            serial: random_serial().to_be_bytes().to_vec(),
            not_before,
            not_after,
        })
    }

    /// Rebuilds the template of an existing certificate with a new validity
    /// window. Serial, subject, extensions and SANs carry over unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the validity window overflows.
    pub fn renewal_of(cert: &Certificate, valid_days: u32) -> Result<Self> {
        let (not_before, not_after) = validity_window(Utc::now(), valid_days)?;
        Ok(Self {
            subject: cert.subject().clone(),
            profile: ExtensionProfile {
                key_usage: cert.key_usage(),
                ext_key_usage: cert.ext_key_usage(),
                is_ca: cert.is_ca(),
            },
            dns_names: cert.dns_names().to_vec(),
            ip_addresses: cert.ip_addresses().to_vec(),
            serial: cert.serial().to_vec(),
            not_before,
            not_after,
        })
    }

    /// Sets the subject alternative names.
    #[must_use]
    pub fn with_sans(mut self, dns_names: Vec<String>, ip_addresses: Vec<IpAddr>) -> Self {
        self.dns_names = dns_names;
        self.ip_addresses = ip_addresses;
        self
    }

    fn to_params(&self) -> Result<CertificateParams> {
        let mut params = CertificateParams::default();
        params.distinguished_name = distinguished_name(&self.subject);
        params.serial_number = Some(SerialNumber::from_slice(&self.serial));
        params.not_before = to_rcgen_time(self.not_before)?;
        params.not_after = to_rcgen_time(self.not_after)?;
        params.is_ca = self.profile.basic_constraints();
        params.key_usages = self.profile.key_usage_purposes();
        params.extended_key_usages = self.profile.extended_key_usage_purposes();
        params.subject_alt_names = subject_alt_names(&self.dns_names, &self.ip_addresses)?;
        Ok(params)
    }
}

/// Who signs the certificate.
#[derive(Debug, Clone, Copy)]
pub enum Parent<'a> {
    /// The subject key signs its own certificate.
    SelfSigned,
    /// An existing CA certificate and its key sign the certificate.
    Issuer {
        /// Issuing certificate.
        certificate: &'a Certificate,
        /// Issuing private key.
        key: &'a SigningKey,
    },
}

/// Signs `template` for `subject_key` and decodes the result.
///
/// rcgen signs when it holds both keys; any P-224 key on either side goes
/// through the field-by-field encoder instead.
///
/// # Errors
///
/// Returns [`Error::Signing`] if the template or the issuer is rejected,
/// and [`Error::San`] for DNS names that are not valid IA5 strings.
pub fn sign(
    template: &CertificateTemplate,
    subject_key: &SigningKey,
    parent: Parent<'_>,
) -> Result<Certificate> {
    let Some(subject_pair) = subject_key.as_rcgen() else {
        debug!(subject = %template.subject, "encoding P-224 certificate");
        return encoder::sign(template, subject_key, parent);
    };

    let params = template.to_params()?;
    let cert = match parent {
        Parent::SelfSigned => {
            debug!(subject = %template.subject, "self-signing certificate");
            params
                .self_signed(subject_pair)
                .map_err(|e| Error::Signing(format!("failed to self-sign certificate: {e}")))?
        }
        Parent::Issuer { certificate, key } => {
            let Some(issuer_pair) = key.as_rcgen() else {
                debug!(
                    subject = %template.subject,
                    issuer = %certificate.subject(),
                    "encoding certificate for P-224 issuer"
                );
                return encoder::sign(template, subject_key, parent);
            };
            debug!(
                subject = %template.subject,
                issuer = %certificate.subject(),
                "signing certificate with issuer"
            );
            let issuer = issuer_cert(certificate, issuer_pair)?;
            params
                .signed_by(subject_pair, &issuer, issuer_pair)
                .map_err(|e| Error::Signing(format!("failed to sign certificate: {e}")))?
        }
    };

    Certificate::from_der(cert.der())
}

/// Rebuilds an rcgen handle for an issuer so its subject name can be
/// written into the child. Only the name and key matter for signing.
fn issuer_cert(issuer: &Certificate, key: &KeyPair) -> Result<rcgen::Certificate> {
    let mut params = CertificateParams::default();
    params.distinguished_name = distinguished_name(issuer.subject());
    params.is_ca = ExtensionProfile {
        is_ca: issuer.is_ca(),
        ..ExtensionProfile::default()
    }
    .basic_constraints();
    params.not_before = to_rcgen_time(issuer.not_before())?;
    params.not_after = to_rcgen_time(issuer.not_after())?;

    params
        .self_signed(key)
        .map_err(|e| Error::Signing(format!("failed to load issuer certificate: {e}")))
}

/// Draws a random serial number in `1..=MAX_SERIAL`.
#[must_use]
pub fn random_serial() -> u64 {
    OsRng.gen_range(1..=MAX_SERIAL)
}

/// `[now, now + valid_days)` using calendar-day arithmetic, truncated to
/// whole seconds so the window survives an encode/decode round trip.
///
/// # Errors
///
/// Returns [`Error::Validation`] if the end date is not representable.
pub fn validity_window(
    now: DateTime<Utc>,
    valid_days: u32,
) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let not_before = DateTime::from_timestamp(now.timestamp(), 0)
        .ok_or_else(|| Error::Validation("current time out of range".into()))?;
    let not_after = not_before
        .checked_add_days(Days::new(u64::from(valid_days)))
        .ok_or_else(|| Error::Validation(format!("validity of {valid_days} days overflows")))?;
    Ok((not_before, not_after))
}

/// Converts a chrono `DateTime` to rcgen `OffsetDateTime`.
fn to_rcgen_time(dt: DateTime<Utc>) -> Result<time::OffsetDateTime> {
    time::OffsetDateTime::from_unix_timestamp(dt.timestamp())
        .map_err(|e| Error::Signing(format!("invalid timestamp: {e}")))
}

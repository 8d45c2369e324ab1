//! Mapping from request fields to X.509 names and extensions.
//!
//! Nothing here touches keys or storage; the signer consumes the results.

use std::net::IpAddr;

use rcgen::{
    BasicConstraints as RcgenBasicConstraints, DistinguishedName, DnType, ExtendedKeyUsagePurpose,
    Ia5String, IsCa, KeyUsagePurpose, SanType,
};
use tracing::warn;

use crate::error::{Error, Result};
use crate::types::{BasicConstraints, CertUsage, ExtKeyUsageFlags, KeyUsageFlags, Subject};

/// The extension set stamped into a certificate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtensionProfile {
    /// Key usage bits.
    pub key_usage: KeyUsageFlags,
    /// Extended key usage purposes.
    pub ext_key_usage: ExtKeyUsageFlags,
    /// Basic constraints CA flag.
    pub is_ca: bool,
}

impl ExtensionProfile {
    /// Default extensions for a usage tag.
    #[must_use]
    pub const fn for_usage(usage: CertUsage) -> Self {
        let none = KeyUsageFlags {
            digital_signature: false,
            key_encipherment: false,
            key_cert_sign: false,
            crl_sign: false,
        };
        let no_ext = ExtKeyUsageFlags {
            server_auth: false,
            client_auth: false,
            code_signing: false,
        };
        match usage {
            CertUsage::Ca => Self {
                key_usage: KeyUsageFlags {
                    key_cert_sign: true,
                    crl_sign: true,
                    ..none
                },
                ext_key_usage: no_ext,
                is_ca: true,
            },
            CertUsage::Server => Self {
                key_usage: KeyUsageFlags {
                    digital_signature: true,
                    key_encipherment: true,
                    ..none
                },
                ext_key_usage: no_ext,
                is_ca: false,
            },
            CertUsage::Client => Self {
                key_usage: KeyUsageFlags {
                    digital_signature: true,
                    ..none
                },
                ext_key_usage: ExtKeyUsageFlags {
                    client_auth: true,
                    ..no_ext
                },
                is_ca: false,
            },
            CertUsage::Code => Self {
                key_usage: KeyUsageFlags {
                    digital_signature: true,
                    ..none
                },
                ext_key_usage: ExtKeyUsageFlags {
                    code_signing: true,
                    ..no_ext
                },
                is_ca: false,
            },
        }
    }

    /// Combines the usage table with explicitly supplied flag groups.
    ///
    /// Each explicit group replaces the corresponding table entry wholesale;
    /// the table only fills groups the caller left out.
    #[must_use]
    pub fn resolve(
        usage: Option<CertUsage>,
        key_usage: Option<KeyUsageFlags>,
        ext_key_usage: Option<ExtKeyUsageFlags>,
        basic_constraints: Option<BasicConstraints>,
    ) -> Self {
        let table = usage.map(Self::for_usage).unwrap_or_default();
        Self {
            key_usage: key_usage.unwrap_or(table.key_usage),
            ext_key_usage: ext_key_usage.unwrap_or(table.ext_key_usage),
            is_ca: basic_constraints.map_or(table.is_ca, |bc| bc.ca),
        }
    }

    pub(crate) fn key_usage_purposes(&self) -> Vec<KeyUsagePurpose> {
        let ku = self.key_usage;
        [
            (ku.digital_signature, KeyUsagePurpose::DigitalSignature),
            (ku.key_encipherment, KeyUsagePurpose::KeyEncipherment),
            (ku.key_cert_sign, KeyUsagePurpose::KeyCertSign),
            (ku.crl_sign, KeyUsagePurpose::CrlSign),
        ]
        .into_iter()
        .filter_map(|(set, purpose)| set.then_some(purpose))
        .collect()
    }

    pub(crate) fn extended_key_usage_purposes(&self) -> Vec<ExtendedKeyUsagePurpose> {
        let eku = self.ext_key_usage;
        [
            (eku.server_auth, ExtendedKeyUsagePurpose::ServerAuth),
            (eku.client_auth, ExtendedKeyUsagePurpose::ClientAuth),
            (eku.code_signing, ExtendedKeyUsagePurpose::CodeSigning),
        ]
        .into_iter()
        .filter_map(|(set, purpose)| set.then_some(purpose))
        .collect()
    }

    /// Basic constraints are always emitted, CA or not.
    pub(crate) const fn basic_constraints(&self) -> IsCa {
        if self.is_ca {
            IsCa::Ca(RcgenBasicConstraints::Unconstrained)
        } else {
            IsCa::ExplicitNoCa
        }
    }
}

/// Builds the distinguished name in `C, ST, L, O, OU, CN` order.
#[must_use]
pub fn distinguished_name(subject: &Subject) -> DistinguishedName {
    let mut dn = DistinguishedName::new();
    let fields = [
        (DnType::CountryName, &subject.country),
        (DnType::StateOrProvinceName, &subject.state),
        (DnType::LocalityName, &subject.city),
        (DnType::OrganizationName, &subject.org),
        (DnType::OrganizationalUnitName, &subject.ou),
        (DnType::CommonName, &subject.common_name),
    ];
    for (ty, value) in fields {
        if let Some(value) = value {
            dn.push(ty, value.as_str());
        }
    }
    dn
}

/// Parses IP SAN strings, dropping the ones that are not IPv4/IPv6 literals.
#[must_use]
pub fn parse_ip_addresses(raw: &[String]) -> Vec<IpAddr> {
    raw.iter()
        .filter_map(|s| match s.trim().parse::<IpAddr>() {
            Ok(ip) => Some(ip),
            Err(_) => {
                warn!(ip = %s, "dropping unparseable IP address from SAN list");
                None
            }
        })
        .collect()
}

/// Converts DNS and IP SANs to rcgen form, DNS names first.
pub(crate) fn subject_alt_names(dns_names: &[String], ips: &[IpAddr]) -> Result<Vec<SanType>> {
    let mut sans = Vec::with_capacity(dns_names.len() + ips.len());
    for dns in dns_names {
        let ia5 = Ia5String::try_from(dns.clone())
            .map_err(|e| Error::San(format!("invalid DNS name '{dns}': {e}")))?;
        sans.push(SanType::DnsName(ia5));
    }
    sans.extend(ips.iter().copied().map(SanType::IpAddress));
    Ok(sans)
}

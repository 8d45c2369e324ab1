//! Signature and chain validation.

use p224::ecdsa::signature::Verifier;
use p224::pkcs8::DecodePublicKey;
use tracing::debug;
use x509_cert::der::{Decode, Encode};
use x509_parser::prelude::*;

use crate::certificate::Certificate;
use crate::error::{Error, Result};
use crate::key::ECDSA_WITH_SHA224;
use crate::types::EcCurve;

/// Checks that `cert` names `issuer` as its issuer and carries a signature
/// made by the issuer's key.
///
/// # Errors
///
/// Returns [`Error::Validation`] on a name mismatch and
/// [`Error::SignatureVerification`] when the signature does not verify.
pub fn verify_issued_by(cert: &Certificate, issuer: &Certificate) -> Result<()> {
    if cert.issuer() != issuer.subject() {
        return Err(Error::Validation(format!(
            "issuer '{}' does not match CA subject '{}'",
            cert.issuer(),
            issuer.subject()
        )));
    }

    if issuer.public_key().curve() == Some(EcCurve::P224) {
        verify_p224(cert, issuer)?;
        debug!(subject = %cert.subject(), issuer = %issuer.subject(), "signature verified");
        return Ok(());
    }

    let (_, parsed_cert) = X509Certificate::from_der(cert.der())
        .map_err(|e| Error::Parse(format!("failed to parse certificate: {e}")))?;
    let (_, parsed_issuer) = X509Certificate::from_der(issuer.der())
        .map_err(|e| Error::Parse(format!("failed to parse issuer certificate: {e}")))?;

    parsed_cert
        .verify_signature(Some(parsed_issuer.public_key()))
        .map_err(|e| {
            Error::SignatureVerification(format!(
                "signature verification failed for '{}': {e:?}",
                cert.subject()
            ))
        })?;

    debug!(subject = %cert.subject(), issuer = %issuer.subject(), "signature verified");
    Ok(())
}

/// x509-parser has no P-224 verifier, so these go through the `p224` crate.
fn verify_p224(cert: &Certificate, issuer: &Certificate) -> Result<()> {
    let failed = |reason: String| {
        Error::SignatureVerification(format!(
            "signature verification failed for '{}': {reason}",
            cert.subject()
        ))
    };

    let child = x509_cert::Certificate::from_der(cert.der())
        .map_err(|e| Error::Parse(format!("failed to parse certificate: {e}")))?;
    let parent = x509_cert::Certificate::from_der(issuer.der())
        .map_err(|e| Error::Parse(format!("failed to parse issuer certificate: {e}")))?;

    if child.signature_algorithm.oid != ECDSA_WITH_SHA224 {
        return Err(failed(format!(
            "algorithm {} cannot be made by a P-224 key",
            child.signature_algorithm.oid
        )));
    }

    let spki = parent
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| failed(e.to_string()))?;
    let verifying_key =
        p224::ecdsa::VerifyingKey::from_public_key_der(&spki).map_err(|e| failed(e.to_string()))?;
    let signature = p224::ecdsa::Signature::from_der(child.signature.raw_bytes())
        .map_err(|e| failed(e.to_string()))?;
    let tbs = child
        .tbs_certificate
        .to_der()
        .map_err(|e| failed(e.to_string()))?;

    verifying_key
        .verify(&tbs, &signature)
        .map_err(|e| failed(e.to_string()))
}

/// Validates a leaf-first chain: every certificate is issued by the next
/// one, every issuer is a CA, and the last one is a self-signed root.
///
/// # Errors
///
/// Returns [`Error::InvalidChain`] for an empty chain or a non-CA issuer,
/// and any error from [`verify_issued_by`].
pub fn validate_chain(chain: &[Certificate]) -> Result<()> {
    let Some(root) = chain.last() else {
        return Err(Error::InvalidChain("empty certificate chain".into()));
    };

    for pair in chain.windows(2) {
        let (cert, issuer) = (&pair[0], &pair[1]);
        if !issuer.is_ca() {
            return Err(Error::InvalidChain(format!(
                "'{}' is not a CA but issued '{}'",
                issuer.subject(),
                cert.subject()
            )));
        }
        verify_issued_by(cert, issuer)?;
    }

    verify_issued_by(root, root)
        .map_err(|e| Error::InvalidChain(format!("chain does not end in a self-signed root: {e}")))
}

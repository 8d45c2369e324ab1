//! PKI error types.

use thiserror::Error;

/// Result type for PKI operations.
pub type Result<T> = std::result::Result<T, Error>;

/// PKI error variants.
#[derive(Debug, Error)]
pub enum Error {
    /// The requested key algorithm is not one of RSA, ECDSA or ED25519.
    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),

    /// The requested elliptic curve is not P224, P256, P384 or P521.
    #[error("unsupported elliptic curve: {0}")]
    UnsupportedCurve(String),

    /// Key pair generation failed.
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// Producing or signing the certificate failed.
    #[error("certificate signing failed: {0}")]
    Signing(String),

    /// PEM armor was missing, had the wrong label, or held undecodable DER.
    #[error("PEM decode failed: {0}")]
    PemDecode(String),

    /// Certificate parsing failed.
    #[error("certificate parsing failed: {0}")]
    Parse(String),

    /// Certificate validation failed.
    #[error("certificate validation failed: {0}")]
    Validation(String),

    /// Invalid certificate chain.
    #[error("invalid certificate chain: {0}")]
    InvalidChain(String),

    /// Signature verification failed.
    #[error("signature verification failed: {0}")]
    SignatureVerification(String),

    /// Subject Alternative Name error.
    #[error("SAN error: {0}")]
    San(String),
}

//! Key pair generation for RSA, ECDSA and Ed25519.

use std::ops::RangeInclusive;

use rand::rngs::OsRng;
use rcgen::{
    KeyPair, PKCS_ECDSA_P256_SHA256, PKCS_ECDSA_P384_SHA384, PKCS_ECDSA_P521_SHA512, PKCS_ED25519,
};
use rsa::RsaPrivateKey;
use rsa::pkcs8::EncodePrivateKey;
use tracing::debug;

use crate::certificate::PrivateKey;
use crate::error::{Error, Result};
use crate::key::SigningKey;
use crate::types::{EcCurve, KeyAlgorithm, KeySpec};

/// RSA modulus sizes the signing backend accepts.
pub const RSA_KEY_BITS: RangeInclusive<usize> = 2048..=8192;

/// A freshly generated key pair, tagged with the parameters it was made with.
pub enum GeneratedKey {
    /// RSA key.
    Rsa {
        /// Modulus size in bits.
        bits: usize,
        /// Signing handle.
        key: SigningKey,
    },
    /// ECDSA key.
    Ecdsa {
        /// Named curve.
        curve: EcCurve,
        /// Signing handle.
        key: SigningKey,
    },
    /// Ed25519 key.
    Ed25519 {
        /// Signing handle.
        key: SigningKey,
    },
}

impl GeneratedKey {
    /// Returns the algorithm family.
    #[must_use]
    pub const fn algorithm(&self) -> KeyAlgorithm {
        match self {
            Self::Rsa { .. } => KeyAlgorithm::Rsa,
            Self::Ecdsa { .. } => KeyAlgorithm::Ecdsa,
            Self::Ed25519 { .. } => KeyAlgorithm::Ed25519,
        }
    }

    /// RSA modulus size, if this is an RSA key.
    #[must_use]
    pub const fn rsa_bits(&self) -> Option<usize> {
        match self {
            Self::Rsa { bits, .. } => Some(*bits),
            _ => None,
        }
    }

    /// Curve, if this is an ECDSA key.
    #[must_use]
    pub const fn curve(&self) -> Option<EcCurve> {
        match self {
            Self::Ecdsa { curve, .. } => Some(*curve),
            _ => None,
        }
    }

    /// Returns the signing handle used by the signer.
    #[must_use]
    pub const fn signing_key(&self) -> &SigningKey {
        match self {
            Self::Rsa { key, .. } | Self::Ecdsa { key, .. } | Self::Ed25519 { key } => key,
        }
    }

    /// DER-encoded `SubjectPublicKeyInfo`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyGeneration`] if the public key cannot be encoded.
    pub fn public_key_der(&self) -> Result<Vec<u8>> {
        self.signing_key().public_key_der()
    }

    /// PKCS#8 private key, ready for PEM armoring.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyGeneration`] if the key cannot be encoded.
    pub fn private_key(&self) -> Result<PrivateKey> {
        self.signing_key().private_key()
    }
}

impl std::fmt::Debug for GeneratedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratedKey")
            .field("algorithm", &self.algorithm())
            .field("rsa_bits", &self.rsa_bits())
            .field("curve", &self.curve())
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Generates a key pair for the given spec.
///
/// # Errors
///
/// Returns [`Error::KeyGeneration`] when the RNG or backend fails, or when
/// an RSA size falls outside [`RSA_KEY_BITS`].
pub fn generate(spec: &KeySpec) -> Result<GeneratedKey> {
    debug!(algorithm = %spec.algorithm(), "generating key pair");

    match *spec {
        KeySpec::Rsa { bits } => generate_rsa(bits),
        KeySpec::Ecdsa(curve) => {
            let alg = match curve {
                EcCurve::P224 => {
                    return Ok(GeneratedKey::Ecdsa {
                        curve,
                        key: SigningKey::generate_p224(),
                    });
                }
                EcCurve::P256 => &PKCS_ECDSA_P256_SHA256,
                EcCurve::P384 => &PKCS_ECDSA_P384_SHA384,
                EcCurve::P521 => &PKCS_ECDSA_P521_SHA512,
            };
            let key_pair = KeyPair::generate_for(alg)
                .map_err(|e| Error::KeyGeneration(format!("ECDSA {curve}: {e}")))?;
            Ok(GeneratedKey::Ecdsa {
                curve,
                key: SigningKey::Rcgen(key_pair),
            })
        }
        KeySpec::Ed25519 => {
            let key_pair = KeyPair::generate_for(&PKCS_ED25519)
                .map_err(|e| Error::KeyGeneration(format!("ED25519: {e}")))?;
            Ok(GeneratedKey::Ed25519 {
                key: SigningKey::Rcgen(key_pair),
            })
        }
    }
}

/// RSA keys come from the `rsa` crate and are handed to rcgen as PKCS#8.
fn generate_rsa(bits: usize) -> Result<GeneratedKey> {
    if !RSA_KEY_BITS.contains(&bits) {
        return Err(Error::KeyGeneration(format!(
            "RSA {bits}: key size must be between {} and {} bits",
            RSA_KEY_BITS.start(),
            RSA_KEY_BITS.end()
        )));
    }
    let private = RsaPrivateKey::new(&mut OsRng, bits)
        .map_err(|e| Error::KeyGeneration(format!("RSA {bits}: {e}")))?;
    let pkcs8 = private
        .to_pkcs8_der()
        .map_err(|e| Error::KeyGeneration(format!("RSA {bits}: PKCS#8 encoding: {e}")))?;
    let key_pair = KeyPair::try_from(pkcs8.as_bytes())
        .map_err(|e| Error::KeyGeneration(format!("RSA {bits}: {e}")))?;
    Ok(GeneratedKey::Rsa {
        bits,
        key: SigningKey::Rcgen(key_pair),
    })
}

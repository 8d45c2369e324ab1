//! Signing keys.
//!
//! rcgen holds RSA, ECDSA P-256/P-384/P-521 and Ed25519 keys. P-224 has no
//! rcgen signature algorithm, so those keys live in the RustCrypto `p224`
//! crate. Both kinds expose the same capabilities: the public key, PKCS#8
//! export, and signing arbitrary bytes.

use aws_lc_rs::rand::SystemRandom;
use aws_lc_rs::signature::{
    ECDSA_P256_SHA256_ASN1_SIGNING, ECDSA_P384_SHA384_ASN1_SIGNING,
    ECDSA_P521_SHA512_ASN1_SIGNING, EcdsaKeyPair, EcdsaSigningAlgorithm, Ed25519KeyPair,
    RSA_PKCS1_SHA256, RsaKeyPair,
};
use const_oid::ObjectIdentifier;
use p224::ecdsa::signature::Signer;
use p224::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey};
use rcgen::{
    KeyPair, PKCS_ECDSA_P256_SHA256, PKCS_ECDSA_P384_SHA384, PKCS_ECDSA_P521_SHA512, PKCS_ED25519,
    PKCS_RSA_SHA256,
};
use x509_cert::der::{Any, Tag};
use x509_cert::spki::AlgorithmIdentifierOwned;

use crate::certificate::PrivateKey;
use crate::error::{Error, Result};

pub(crate) const SHA256_WITH_RSA: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
pub(crate) const ECDSA_WITH_SHA224: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.1");
pub(crate) const ECDSA_WITH_SHA256: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");
pub(crate) const ECDSA_WITH_SHA384: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.3");
pub(crate) const ECDSA_WITH_SHA512: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.4");
pub(crate) const ED25519: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.112");

/// A private key that can sign certificates.
pub enum SigningKey {
    /// RSA, ECDSA P-256/P-384/P-521 or Ed25519.
    Rcgen(KeyPair),
    /// ECDSA P-224.
    P224(p224::ecdsa::SigningKey),
}

/// Which rcgen algorithm a key was loaded as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RcgenAlgorithm {
    RsaSha256,
    EcdsaP256,
    EcdsaP384,
    EcdsaP521,
    Ed25519,
}

impl RcgenAlgorithm {
    fn of(key_pair: &KeyPair) -> Result<Self> {
        let alg = key_pair.algorithm();
        if alg == &PKCS_RSA_SHA256 {
            Ok(Self::RsaSha256)
        } else if alg == &PKCS_ECDSA_P256_SHA256 {
            Ok(Self::EcdsaP256)
        } else if alg == &PKCS_ECDSA_P384_SHA384 {
            Ok(Self::EcdsaP384)
        } else if alg == &PKCS_ECDSA_P521_SHA512 {
            Ok(Self::EcdsaP521)
        } else if alg == &PKCS_ED25519 {
            Ok(Self::Ed25519)
        } else {
            Err(Error::Signing(format!("no signer for key algorithm {alg:?}")))
        }
    }
}

impl SigningKey {
    /// Generates a fresh P-224 key.
    #[must_use]
    pub fn generate_p224() -> Self {
        Self::P224(p224::ecdsa::SigningKey::random(&mut rand::rngs::OsRng))
    }

    /// Loads a PKCS#8 private key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PemDecode`] if neither backend accepts the bytes.
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self> {
        match KeyPair::try_from(der) {
            Ok(key_pair) => Ok(Self::Rcgen(key_pair)),
            Err(rcgen_err) => p224::ecdsa::SigningKey::from_pkcs8_der(der)
                .map(Self::P224)
                .map_err(|_| Error::PemDecode(format!("failed to parse private key: {rcgen_err}"))),
        }
    }

    /// The rcgen handle, when rcgen holds this key.
    #[must_use]
    pub const fn as_rcgen(&self) -> Option<&KeyPair> {
        match self {
            Self::Rcgen(key_pair) => Some(key_pair),
            Self::P224(_) => None,
        }
    }

    /// DER-encoded `SubjectPublicKeyInfo`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyGeneration`] if the public key cannot be encoded.
    pub fn public_key_der(&self) -> Result<Vec<u8>> {
        match self {
            Self::Rcgen(key_pair) => Ok(key_pair.public_key_der()),
            Self::P224(key) => key
                .verifying_key()
                .to_public_key_der()
                .map(|doc| doc.as_bytes().to_vec())
                .map_err(|e| Error::KeyGeneration(format!("P224 public key: {e}"))),
        }
    }

    /// PKCS#8 private key, ready for PEM armoring.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyGeneration`] if the key cannot be encoded.
    pub fn private_key(&self) -> Result<PrivateKey> {
        match self {
            Self::Rcgen(key_pair) => Ok(PrivateKey::new(key_pair.serialize_der())),
            Self::P224(key) => key
                .to_pkcs8_der()
                .map(|doc| PrivateKey::new(doc.as_bytes().to_vec()))
                .map_err(|e| Error::KeyGeneration(format!("P224 PKCS#8 encoding: {e}"))),
        }
    }

    /// The `AlgorithmIdentifier` of signatures this key produces.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Signing`] for rcgen keys of an algorithm with no signer.
    pub fn signature_algorithm(&self) -> Result<AlgorithmIdentifierOwned> {
        let (oid, parameters) = match self {
            Self::P224(_) => (ECDSA_WITH_SHA224, None),
            Self::Rcgen(key_pair) => match RcgenAlgorithm::of(key_pair)? {
                RcgenAlgorithm::RsaSha256 => (SHA256_WITH_RSA, Some(null()?)),
                RcgenAlgorithm::EcdsaP256 => (ECDSA_WITH_SHA256, None),
                RcgenAlgorithm::EcdsaP384 => (ECDSA_WITH_SHA384, None),
                RcgenAlgorithm::EcdsaP521 => (ECDSA_WITH_SHA512, None),
                RcgenAlgorithm::Ed25519 => (ED25519, None),
            },
        };
        Ok(AlgorithmIdentifierOwned { oid, parameters })
    }

    /// Signs `message`, returning the signature in its X.509 encoding.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Signing`] if the backend rejects the key or fails.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::P224(key) => {
                let signature: p224::ecdsa::Signature = key
                    .try_sign(message)
                    .map_err(|e| Error::Signing(format!("P224: {e}")))?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
            Self::Rcgen(key_pair) => sign_with_aws_lc(key_pair, message),
        }
    }
}

fn sign_with_aws_lc(key_pair: &KeyPair, message: &[u8]) -> Result<Vec<u8>> {
    let pkcs8 = key_pair.serialized_der();
    let rng = SystemRandom::new();
    match RcgenAlgorithm::of(key_pair)? {
        RcgenAlgorithm::RsaSha256 => {
            let key = RsaKeyPair::from_pkcs8(pkcs8)
                .map_err(|e| Error::Signing(format!("RSA key rejected: {e}")))?;
            let mut signature = vec![0; key.public_modulus_len()];
            key.sign(&RSA_PKCS1_SHA256, &rng, message, &mut signature)
                .map_err(|e| Error::Signing(format!("RSA: {e}")))?;
            Ok(signature)
        }
        RcgenAlgorithm::EcdsaP256 => sign_ecdsa(&ECDSA_P256_SHA256_ASN1_SIGNING, pkcs8, message, &rng),
        RcgenAlgorithm::EcdsaP384 => sign_ecdsa(&ECDSA_P384_SHA384_ASN1_SIGNING, pkcs8, message, &rng),
        RcgenAlgorithm::EcdsaP521 => sign_ecdsa(&ECDSA_P521_SHA512_ASN1_SIGNING, pkcs8, message, &rng),
        RcgenAlgorithm::Ed25519 => {
            let key = Ed25519KeyPair::from_pkcs8_maybe_unchecked(pkcs8)
                .map_err(|e| Error::Signing(format!("ED25519 key rejected: {e}")))?;
            Ok(key.sign(message).as_ref().to_vec())
        }
    }
}

fn sign_ecdsa(
    alg: &'static EcdsaSigningAlgorithm,
    pkcs8: &[u8],
    message: &[u8],
    rng: &SystemRandom,
) -> Result<Vec<u8>> {
    let key = EcdsaKeyPair::from_pkcs8(alg, pkcs8)
        .map_err(|e| Error::Signing(format!("ECDSA key rejected: {e}")))?;
    key.sign(rng, message)
        .map(|signature| signature.as_ref().to_vec())
        .map_err(|e| Error::Signing(format!("ECDSA: {e}")))
}

/// RSA signature algorithms carry an explicit NULL parameter.
fn null() -> Result<Any> {
    Any::new(Tag::Null, Vec::new()).map_err(|e| Error::Signing(format!("DER encoding: {e}")))
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let backend = match self {
            Self::Rcgen(_) => "rcgen",
            Self::P224(_) => "p224",
        };
        f.debug_struct("SigningKey")
            .field("backend", &backend)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

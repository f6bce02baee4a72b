//! # Operator and Topic Keys
//!
//! Ledger accounts and topics may be keyed with either Ed25519 or
//! secp256k1. `PrivateKey`, `PublicKey` and `Signature` carry the curve as
//! their variant, so a key never verifies a signature from the other curve.
//!
//! - Ed25519 is the default for generated operator and topic keys.
//! - secp256k1 signs with RFC 6979 nonces over SHA-256 of the message;
//!   public keys are kept in 33-byte compressed SEC1 form.
//!
//! Secret material lives inside the curve crates' signing keys, which wipe
//! themselves on drop.
//!
//! ## String Forms
//!
//! | Form | Meaning |
//! |------|---------|
//! | 64 hex chars | raw Ed25519 seed |
//! | `0x` + 64 hex chars | raw secp256k1 scalar |
//! | `302e0201…0420` + 32 bytes | DER (PKCS#8) Ed25519 private key |
//! | `30300201…0420` + 32 bytes | DER (PKCS#8) secp256k1 private key |
//! | `302a3005…2100` + 32 bytes | DER (SPKI) Ed25519 public key |
//! | `302d3007…2200` + 33 bytes | DER (SPKI) compressed secp256k1 public key |

use crate::CryptoError;
use ed25519_dalek::{Signer as _, Verifier as _};
use k256::ecdsa::signature::{Signer as _, Verifier as _};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroize;

const ED25519_PRIVATE_DER_PREFIX: &str = "302e020100300506032b657004220420";
const SECP256K1_PRIVATE_DER_PREFIX: &str = "3030020100300706052b8104000a04220420";
const ED25519_PUBLIC_DER_PREFIX: &str = "302a300506032b6570032100";
const SECP256K1_PUBLIC_DER_PREFIX: &str = "302d300706052b8104000a032200";

/// Which curve a key lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAlgorithm {
    /// Ed25519 (default).
    Ed25519,
    /// secp256k1 ECDSA.
    Secp256k1,
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ed25519 => "ed25519",
            Self::Secp256k1 => "secp256k1",
        })
    }
}

// =============================================================================
// PRIVATE KEY
// =============================================================================

/// A signing key: an operator's payer key or a topic admin/submit key.
#[derive(Clone)]
pub enum PrivateKey {
    /// Ed25519 signing key.
    Ed25519(ed25519_dalek::SigningKey),
    /// secp256k1 ECDSA signing key.
    Secp256k1(k256::ecdsa::SigningKey),
}

impl PrivateKey {
    /// Generate a fresh Ed25519 key.
    pub fn generate_ed25519() -> Self {
        Self::Ed25519(ed25519_dalek::SigningKey::generate(&mut rand::thread_rng()))
    }

    /// Generate a fresh secp256k1 key.
    pub fn generate_secp256k1() -> Self {
        Self::Secp256k1(k256::ecdsa::SigningKey::random(&mut rand::thread_rng()))
    }

    /// Ed25519 key from its 32-byte seed.
    pub fn ed25519_from_seed(seed: &[u8; 32]) -> Self {
        Self::Ed25519(ed25519_dalek::SigningKey::from_bytes(seed))
    }

    /// secp256k1 key from its 32-byte scalar.
    ///
    /// # Errors
    ///
    /// `InvalidPrivateKey` for zero or out-of-range scalars.
    pub fn secp256k1_from_scalar(scalar: &[u8; 32]) -> Result<Self, CryptoError> {
        k256::ecdsa::SigningKey::from_bytes(scalar.into())
            .map(Self::Secp256k1)
            .map_err(|_| CryptoError::InvalidPrivateKey)
    }

    /// Curve of this key.
    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            Self::Ed25519(_) => KeyAlgorithm::Ed25519,
            Self::Secp256k1(_) => KeyAlgorithm::Secp256k1,
        }
    }

    /// Matching public key.
    pub fn public_key(&self) -> PublicKey {
        match self {
            Self::Ed25519(key) => PublicKey::Ed25519(key.verifying_key().to_bytes()),
            Self::Secp256k1(key) => {
                let point = key.verifying_key().to_encoded_point(true);
                // Compressed SEC1 points are always 33 bytes.
                let mut bytes = [0u8; 33];
                bytes.copy_from_slice(point.as_bytes());
                PublicKey::Secp256k1(bytes)
            }
        }
    }

    /// Sign `message`. Both curves sign deterministically.
    pub fn sign(&self, message: &[u8]) -> Signature {
        match self {
            Self::Ed25519(key) => Signature::Ed25519(key.sign(message).to_bytes()),
            Self::Secp256k1(key) => {
                let sig: k256::ecdsa::Signature = key.sign(message);
                Signature::Secp256k1(sig.to_bytes().into())
            }
        }
    }

    /// DER (PKCS#8) hex encoding, the form operators keep in `.env` files.
    pub fn to_der_hex(&self) -> String {
        let (prefix, mut secret): (&str, [u8; 32]) = match self {
            Self::Ed25519(key) => (ED25519_PRIVATE_DER_PREFIX, key.to_bytes()),
            Self::Secp256k1(key) => (SECP256K1_PRIVATE_DER_PREFIX, key.to_bytes().into()),
        };
        let out = format!("{prefix}{}", hex::encode(secret));
        secret.zeroize();
        out
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("algorithm", &self.algorithm())
            .field("public_key", &self.public_key().to_der_hex())
            .finish_non_exhaustive()
    }
}

impl FromStr for PrivateKey {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim().to_ascii_lowercase();

        let (algorithm, raw) = if let Some(raw) = text.strip_prefix(ED25519_PRIVATE_DER_PREFIX) {
            (KeyAlgorithm::Ed25519, raw)
        } else if let Some(raw) = text.strip_prefix(SECP256K1_PRIVATE_DER_PREFIX) {
            (KeyAlgorithm::Secp256k1, raw)
        } else if let Some(raw) = text.strip_prefix("0x") {
            (KeyAlgorithm::Secp256k1, raw)
        } else {
            (KeyAlgorithm::Ed25519, text.as_str())
        };

        let mut secret = decode_fixed::<32>(raw).ok_or(CryptoError::InvalidPrivateKey)?;
        let key = match algorithm {
            KeyAlgorithm::Ed25519 => Ok(Self::ed25519_from_seed(&secret)),
            KeyAlgorithm::Secp256k1 => Self::secp256k1_from_scalar(&secret),
        };
        secret.zeroize();
        key
    }
}

// =============================================================================
// PUBLIC KEY
// =============================================================================

/// A verification key, stored as validated raw bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PublicKey {
    /// Ed25519 public key.
    Ed25519([u8; 32]),
    /// Compressed secp256k1 public key.
    Secp256k1([u8; 33]),
}

impl PublicKey {
    /// Ed25519 key from raw bytes, rejecting points off the curve.
    ///
    /// # Errors
    ///
    /// `InvalidPublicKey` when the bytes do not decode to a curve point.
    pub fn ed25519_from_bytes(bytes: [u8; 32]) -> Result<Self, CryptoError> {
        ed25519_dalek::VerifyingKey::from_bytes(&bytes)
            .map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self::Ed25519(bytes))
    }

    /// secp256k1 key from compressed SEC1 bytes (`0x02`/`0x03` prefix).
    ///
    /// # Errors
    ///
    /// `InvalidPublicKey` when the bytes do not decode to a curve point.
    pub fn secp256k1_from_bytes(bytes: [u8; 33]) -> Result<Self, CryptoError> {
        k256::ecdsa::VerifyingKey::from_sec1_bytes(&bytes)
            .map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self::Secp256k1(bytes))
    }

    /// Curve of this key.
    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            Self::Ed25519(_) => KeyAlgorithm::Ed25519,
            Self::Secp256k1(_) => KeyAlgorithm::Secp256k1,
        }
    }

    /// Raw key bytes (32 for Ed25519, 33 for secp256k1).
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Ed25519(bytes) => bytes.to_vec(),
            Self::Secp256k1(bytes) => bytes.to_vec(),
        }
    }

    /// Verify `signature` over `message`.
    ///
    /// # Errors
    ///
    /// `SignatureVerificationFailed` for a bad signature or one made on the
    /// other curve.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), CryptoError> {
        match (self, signature) {
            (Self::Ed25519(key), Signature::Ed25519(sig)) => {
                let key = ed25519_dalek::VerifyingKey::from_bytes(key)
                    .map_err(|_| CryptoError::InvalidPublicKey)?;
                key.verify(message, &ed25519_dalek::Signature::from_bytes(sig))
                    .map_err(|_| CryptoError::SignatureVerificationFailed)
            }
            (Self::Secp256k1(key), Signature::Secp256k1(sig)) => {
                let key = k256::ecdsa::VerifyingKey::from_sec1_bytes(key)
                    .map_err(|_| CryptoError::InvalidPublicKey)?;
                let sig = k256::ecdsa::Signature::from_slice(sig)
                    .map_err(|_| CryptoError::InvalidSignature)?;
                key.verify(message, &sig)
                    .map_err(|_| CryptoError::SignatureVerificationFailed)
            }
            _ => Err(CryptoError::SignatureVerificationFailed),
        }
    }

    /// DER (SPKI) hex encoding.
    pub fn to_der_hex(&self) -> String {
        match self {
            Self::Ed25519(bytes) => format!("{ED25519_PUBLIC_DER_PREFIX}{}", hex::encode(bytes)),
            Self::Secp256k1(bytes) => {
                format!("{SECP256K1_PUBLIC_DER_PREFIX}{}", hex::encode(bytes))
            }
        }
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_der_hex())
    }
}

impl FromStr for PublicKey {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim().to_ascii_lowercase();

        if let Some(raw) = text.strip_prefix(SECP256K1_PUBLIC_DER_PREFIX) {
            let bytes = decode_fixed::<33>(raw).ok_or(CryptoError::InvalidPublicKey)?;
            return Self::secp256k1_from_bytes(bytes);
        }

        let raw = text.strip_prefix(ED25519_PUBLIC_DER_PREFIX).unwrap_or(&text);
        if let Some(bytes) = decode_fixed::<32>(raw) {
            return Self::ed25519_from_bytes(bytes);
        }

        let bytes = decode_fixed::<33>(raw).ok_or(CryptoError::InvalidPublicKey)?;
        Self::secp256k1_from_bytes(bytes)
    }
}

/// A 64-byte signature, tagged with the curve that made it.
///
/// secp256k1 signatures are in `r || s` form.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signature {
    /// Ed25519 signature.
    Ed25519([u8; 64]),
    /// secp256k1 signature.
    Secp256k1([u8; 64]),
}

impl Signature {
    /// Raw signature bytes.
    pub fn as_bytes(&self) -> &[u8; 64] {
        match self {
            Self::Ed25519(bytes) | Self::Secp256k1(bytes) => bytes,
        }
    }
}

fn decode_fixed<const N: usize>(text: &str) -> Option<[u8; N]> {
    let bytes = hex::decode(text).ok()?;
    bytes.try_into().ok()
}

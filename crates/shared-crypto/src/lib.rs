//! # Shared Crypto - Signing Primitives
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `keys` | Ed25519, secp256k1 | Operator and topic keys, signatures, DER/hex import |
//! | `hashing` | SHA-384 | Topic running hashes, transaction hashes |

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod errors;
pub mod hashing;
pub mod keys;

// Re-exports
pub use errors::CryptoError;
pub use hashing::{sha384_hash, Hash384, Sha384Hasher};
pub use keys::{KeyAlgorithm, PrivateKey, PublicKey, Signature};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

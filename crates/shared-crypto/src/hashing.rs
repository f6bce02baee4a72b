//! # SHA-384 Hashing
//!
//! Topic running hashes and transaction hashes are SHA-384 digests.

use sha2::{Digest, Sha384};

/// SHA-384 output (384-bit).
pub type Hash384 = [u8; 48];

/// Stateful SHA-384 hasher.
pub struct Sha384Hasher {
    inner: Sha384,
}

impl Sha384Hasher {
    /// Create a new hasher.
    pub fn new() -> Self {
        Self {
            inner: Sha384::new(),
        }
    }

    /// Update with data.
    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        self.inner.update(data);
        self
    }

    /// Finalize and return the digest.
    pub fn finalize(self) -> Hash384 {
        self.inner.finalize().into()
    }
}

impl Default for Sha384Hasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash data with SHA-384 (one-shot).
pub fn sha384_hash(data: &[u8]) -> Hash384 {
    Sha384::digest(data).into()
}

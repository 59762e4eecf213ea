//! # Digests
//!
//! SHA-256 is the content hash of every stored payload. `hash160` is the
//! 20-byte digest used for public key hashes.

use sha2::{Digest, Sha256};

/// SHA-256 output (256-bit).
pub type Hash = [u8; 32];

/// Stateful SHA-256 hasher.
#[derive(Default, Clone)]
pub struct Sha256Hasher {
    inner: Sha256,
}

impl Sha256Hasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        self.inner.update(data);
        self
    }

    pub fn finalize(self) -> Hash {
        self.inner.finalize().into()
    }
}

/// Hash data with SHA-256 (one-shot).
pub fn sha256(data: &[u8]) -> Hash {
    Sha256::digest(data).into()
}

/// Double SHA-256 truncated to 20 bytes.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let digest = sha256(&sha256(data));
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest[..20]);
    out
}

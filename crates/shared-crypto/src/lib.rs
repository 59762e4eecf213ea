//! # Shared Crypto
//!
//! Signature and digest primitives used by the data storage and
//! authorization layers.
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `hashing` | SHA-256, hash-160 | Content addressing, public key hashes |
//! | `signatures` | Ed25519 | Owner and authorizer signatures |
//!
//! Verification never panics on malformed input: bad key or signature
//! bytes come back as [`CryptoError`] values.

#![warn(clippy::all)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod errors;
pub mod hashing;
pub mod signatures;

pub use errors::CryptoError;
pub use hashing::{hash160, sha256, Sha256Hasher};
pub use signatures::{verify_detached, Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};

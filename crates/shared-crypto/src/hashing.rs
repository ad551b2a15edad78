//! # SHA-256 Hashing
//!
//! Used to derive short, stable key identifiers from key material.

use sha2::{Digest, Sha256};

/// SHA-256 hash output (256-bit).
pub type Hash = [u8; 32];

/// Hash data with SHA-256 (one-shot).
pub fn sha256(data: &[u8]) -> Hash {
    let digest = Sha256::digest(data);
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&digest);
    hash
}

/// Short hex fingerprint (first 8 bytes of SHA-256) naming a key.
pub fn key_fingerprint(key_material: &[u8]) -> String {
    hex::encode(&sha256(key_material)[..8])
}

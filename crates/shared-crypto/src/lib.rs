//! # Shared Crypto - Message Signing Primitives
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `mac` | HMAC-SHA256 | Pre-shared key signatures between known peers |
//! | `signatures` | Ed25519 | Public-key signatures on messages |
//! | `hashing` | SHA-256 | Key fingerprints |
//!
//! ## Security Properties
//!
//! - **HMAC-SHA256**: constant-time verification
//! - **Ed25519**: deterministic nonces, no RNG dependency when signing
//! - Secret key material is zeroized on drop

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod errors;
pub mod hashing;
pub mod mac;
pub mod signatures;

// Re-exports
pub use errors::CryptoError;
pub use hashing::{key_fingerprint, sha256};
pub use mac::{HmacKey, HmacTag};
pub use signatures::{Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

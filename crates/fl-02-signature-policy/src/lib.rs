//! # Signature Policy (FL-02)
//!
//! Decides which messages must be signed on the way out and verified on
//! the way in, and does the signing and verification.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): rules, keys, canonical bytes, config
//! - **Ports Layer** (`ports/`): [`SignaturePolicyApi`]
//! - **Service Layer** (`service.rs`): [`SignaturePolicy`], an atomically
//!   swappable snapshot of rules and keys
//!
//! ## Security Notes
//!
//! - Verification requires at least one signature, and every attached
//!   signature must come from an accepted key and verify.
//! - A failed evaluation never modifies the envelope.
//! - HMAC verification is constant-time.

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::canonical::canonical_bytes;
pub use domain::config::{KeyConfig, SignaturesConfig};
pub use domain::errors::PolicyError;
pub use domain::keys::{KeyStore, SigningKey, VerifyingKey};
pub use domain::rules::{ActionPattern, Direction, SignatureRequirement, SignatureRule};
pub use ports::inbound::{SignResult, SignaturePolicyApi};
pub use service::{PolicySnapshot, SignaturePolicy};

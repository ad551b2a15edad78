//! # Policy Errors

use shared_crypto::CryptoError;
use thiserror::Error;

/// Errors building or applying a signature policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// A rule or signature names a key the store does not hold.
    #[error("unknown key: {0}")]
    UnknownKey(String),

    /// A signature names a key the matching rule does not accept.
    #[error("key {0} is not accepted for this message")]
    UntrustedKey(String),

    /// Verification required but the message carries no signature.
    #[error("message is not signed")]
    MissingSignature,

    /// Signing required but no signing key is available.
    #[error("no signing key configured")]
    NoSigningKey,

    /// Two configured keys share an id.
    #[error("duplicate key id: {0}")]
    DuplicateKey(String),

    /// Key configuration is incomplete or inconsistent.
    #[error("invalid key {id}: {reason}")]
    InvalidKey { id: String, reason: String },

    /// An action pattern could not be parsed.
    #[error("invalid action pattern {0:?}")]
    InvalidPattern(String),

    /// The payload could not be brought into canonical form.
    #[error("payload is not canonicalizable: {0}")]
    Canonicalization(String),

    /// Underlying cryptographic failure.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

//! # HMAC-SHA256 Message Authentication
//!
//! Pre-shared key signatures for peers that share a secret, such as a
//! relay and the management system it is provisioned against.
//!
//! Verification uses constant-time comparison to prevent timing attacks.

use crate::CryptoError;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 tag (32 bytes).
pub type HmacTag = [u8; 32];

/// Shared HMAC secret. Zeroized on drop.
#[derive(Clone)]
pub struct HmacKey {
    secret: Zeroizing<Vec<u8>>,
}

impl HmacKey {
    /// Create a key from raw secret bytes.
    pub fn new(secret: impl Into<Vec<u8>>) -> Result<Self, CryptoError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(CryptoError::EmptyKey);
        }
        Ok(Self {
            secret: Zeroizing::new(secret),
        })
    }

    /// Create a key from a hex-encoded secret.
    pub fn from_hex(secret_hex: &str) -> Result<Self, CryptoError> {
        Self::new(hex::decode(secret_hex)?)
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> HmacTag {
        let mut tag = [0u8; 32];
        if let Ok(mut mac) = HmacSha256::new_from_slice(&self.secret) {
            mac.update(message);
            tag.copy_from_slice(&mac.finalize().into_bytes());
        }
        tag
    }

    /// Verify a tag over a message in constant time.
    pub fn verify(&self, message: &[u8], tag: &[u8]) -> Result<(), CryptoError> {
        if tag.len() != 32 {
            return Err(CryptoError::InvalidSignatureFormat);
        }

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| CryptoError::InvalidKeyLength {
                expected: 32,
                actual: self.secret.len(),
            })?;
        mac.update(message);

        mac.verify_slice(tag)
            .map_err(|_| CryptoError::SignatureVerificationFailed)
    }

    /// Fingerprint of the secret, usable as a key id.
    pub fn fingerprint(&self) -> String {
        crate::key_fingerprint(&self.secret)
    }
}

impl fmt::Debug for HmacKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HmacKey")
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

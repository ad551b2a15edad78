//! # Key Material
//!
//! Signing keys this node signs with, and trusted keys it accepts
//! signatures from. HMAC keys are symmetric and serve both purposes.

use crate::domain::config::KeyConfig;
use crate::domain::errors::PolicyError;
use fl_01_envelope::{Signature, SignatureAlgorithm};
use shared_crypto::{Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature, HmacKey};
use std::collections::BTreeMap;

/// A key this node can sign with.
#[derive(Debug, Clone)]
pub enum SigningKey {
    Hmac(HmacKey),
    Ed25519(Ed25519KeyPair),
}

impl SigningKey {
    #[must_use]
    pub fn algorithm(&self) -> SignatureAlgorithm {
        match self {
            SigningKey::Hmac(_) => SignatureAlgorithm::HmacSha256,
            SigningKey::Ed25519(_) => SignatureAlgorithm::Ed25519,
        }
    }

    /// Hex-encoded signature over `message`.
    #[must_use]
    pub fn sign_hex(&self, message: &[u8]) -> String {
        match self {
            SigningKey::Hmac(key) => hex::encode(key.sign(message)),
            SigningKey::Ed25519(pair) => hex::encode(pair.sign(message).as_bytes()),
        }
    }

    /// The key peers use to check this key's signatures.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        match self {
            SigningKey::Hmac(key) => VerifyingKey::Hmac(key.clone()),
            SigningKey::Ed25519(pair) => VerifyingKey::Ed25519(pair.public_key()),
        }
    }
}

/// A key whose signatures this node accepts.
#[derive(Debug, Clone)]
pub enum VerifyingKey {
    Hmac(HmacKey),
    Ed25519(Ed25519PublicKey),
}

impl VerifyingKey {
    #[must_use]
    pub fn algorithm(&self) -> SignatureAlgorithm {
        match self {
            VerifyingKey::Hmac(_) => SignatureAlgorithm::HmacSha256,
            VerifyingKey::Ed25519(_) => SignatureAlgorithm::Ed25519,
        }
    }

    /// Check one attached signature over `message`.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), PolicyError> {
        if signature.algorithm != self.algorithm() {
            return Err(PolicyError::InvalidKey {
                id: signature.key_id.clone(),
                reason: format!(
                    "signature uses {} but key is {}",
                    signature.algorithm,
                    self.algorithm()
                ),
            });
        }

        let raw = hex::decode(&signature.value)
            .map_err(|e| PolicyError::Crypto(shared_crypto::CryptoError::from(e)))?;

        match self {
            VerifyingKey::Hmac(key) => key.verify(message, &raw)?,
            VerifyingKey::Ed25519(public) => {
                public.verify(message, &Ed25519Signature::from_slice(&raw)?)?;
            }
        }
        Ok(())
    }
}

/// Signing and trusted keys, by key id.
#[derive(Debug, Clone, Default)]
pub struct KeyStore {
    signing: BTreeMap<String, SigningKey>,
    trusted: BTreeMap<String, VerifyingKey>,
}

impl KeyStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key to sign with. It is also trusted for verification.
    pub fn add_signing_key(&mut self, id: impl Into<String>, key: SigningKey) {
        let id = id.into();
        self.trusted.insert(id.clone(), key.verifying_key());
        self.signing.insert(id, key);
    }

    /// Add a key to accept signatures from.
    pub fn add_trusted_key(&mut self, id: impl Into<String>, key: VerifyingKey) {
        self.trusted.insert(id.into(), key);
    }

    #[must_use]
    pub fn signing_key(&self, id: &str) -> Option<&SigningKey> {
        self.signing.get(id)
    }

    #[must_use]
    pub fn trusted_key(&self, id: &str) -> Option<&VerifyingKey> {
        self.trusted.get(id)
    }

    /// Signing keys in id order.
    pub fn signing_keys(&self) -> impl Iterator<Item = (&String, &SigningKey)> {
        self.signing.iter()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.signing.is_empty() && self.trusted.is_empty()
    }

    /// Build a store from configuration entries.
    pub fn from_config(entries: &[KeyConfig]) -> Result<Self, PolicyError> {
        let mut store = Self::new();
        for entry in entries {
            if store.trusted.contains_key(&entry.id) {
                return Err(PolicyError::DuplicateKey(entry.id.clone()));
            }
            let invalid = |reason: &str| PolicyError::InvalidKey {
                id: entry.id.clone(),
                reason: reason.to_string(),
            };

            match entry.algorithm {
                SignatureAlgorithm::HmacSha256 => {
                    let secret = entry
                        .secret_hex
                        .as_deref()
                        .ok_or_else(|| invalid("HMAC keys need secretHex"))?;
                    store.add_signing_key(&entry.id, SigningKey::Hmac(HmacKey::from_hex(secret)?));
                }
                SignatureAlgorithm::Ed25519 => match (&entry.secret_hex, &entry.public_hex) {
                    (Some(seed), _) => {
                        let pair = Ed25519KeyPair::from_seed_hex(seed)?;
                        if let Some(public) = &entry.public_hex {
                            if Ed25519PublicKey::from_hex(public)? != pair.public_key() {
                                return Err(invalid("publicHex does not match secretHex"));
                            }
                        }
                        store.add_signing_key(&entry.id, SigningKey::Ed25519(pair));
                    }
                    (None, Some(public)) => {
                        store.add_trusted_key(
                            &entry.id,
                            VerifyingKey::Ed25519(Ed25519PublicKey::from_hex(public)?),
                        );
                    }
                    (None, None) => {
                        return Err(invalid("Ed25519 keys need secretHex or publicHex"))
                    }
                },
            }
        }
        Ok(store)
    }
}

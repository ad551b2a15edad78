//! # Policy Configuration
//!
//! Serde shapes for loading rules and keys from the adapter configuration.

use crate::domain::rules::{SignatureRequirement, SignatureRule};
use fl_01_envelope::SignatureAlgorithm;
use serde::{Deserialize, Serialize};

/// One configured key.
///
/// HMAC keys need `secretHex`. Ed25519 keys need `secretHex` (a 32-byte
/// seed, making the key usable for signing) or `publicHex` (verification
/// only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyConfig {
    pub id: String,
    pub algorithm: SignatureAlgorithm,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_hex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_hex: Option<String>,
}

/// The `signatures` configuration section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SignaturesConfig {
    /// Requirement for messages no rule matches.
    pub default_requirement: SignatureRequirement,
    /// Rules in evaluation order.
    pub rules: Vec<SignatureRule>,
    pub keys: Vec<KeyConfig>,
}

//! # Routing Header
//!
//! The optional trailing element of every frame: where the message is
//! going, where it has been, and who signed it.

use serde::{Deserialize, Serialize};
use shared_types::{NetworkPath, SourceRouting};
use std::fmt;

/// Algorithms a message signature can be produced with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    /// HMAC-SHA256 over a pre-shared secret.
    HmacSha256,
    /// Ed25519 public-key signature.
    Ed25519,
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureAlgorithm::HmacSha256 => f.write_str("HmacSha256"),
            SignatureAlgorithm::Ed25519 => f.write_str("Ed25519"),
        }
    }
}

/// One signature attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signature {
    /// Identifier of the key that produced the signature.
    pub key_id: String,
    /// Signing algorithm.
    pub algorithm: SignatureAlgorithm,
    /// Hex-encoded signature value.
    pub value: String,
}

/// Multi-hop routing header.
///
/// Every member is omitted from the wire when empty, and a header with no
/// members is omitted from the frame entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Where the message is addressed. `None` means the receiving node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing: Option<SourceRouting>,

    /// Hops the message has traversed, oldest first.
    #[serde(default, skip_serializing_if = "NetworkPath::is_empty")]
    pub path: NetworkPath,

    /// Signatures over the canonical payload.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signatures: Vec<Signature>,
}

impl Header {
    /// Whether the header carries nothing and can be left off the wire.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routing.is_none() && self.path.is_empty() && self.signatures.is_empty()
    }
}

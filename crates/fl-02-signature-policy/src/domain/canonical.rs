//! # Canonical Serialization
//!
//! Signatures cover a canonical rendering of the payload so that peers
//! agree on the signed bytes regardless of how the JSON was formatted:
//! compact, with object keys sorted. Numbers keep their original digits
//! (`arbitrary_precision`), so large integers and long decimals are never
//! rounded into each other. Binary payloads are signed as-is.

use crate::domain::errors::PolicyError;
use fl_01_envelope::Payload;
use serde_json::Value;

/// Bytes a signature over `payload` is computed on.
pub fn canonical_bytes(payload: &Payload) -> Result<Vec<u8>, PolicyError> {
    match payload.as_json() {
        Some(json) => {
            // `Value` keeps objects in a BTreeMap, so keys come out sorted.
            let value: Value = serde_json::from_str(json)
                .map_err(|e| PolicyError::Canonicalization(e.to_string()))?;
            serde_json::to_vec(&value).map_err(|e| PolicyError::Canonicalization(e.to_string()))
        }
        None => Ok(payload.as_bytes().to_vec()),
    }
}

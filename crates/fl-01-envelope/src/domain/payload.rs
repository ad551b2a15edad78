//! # Payloads
//!
//! Message bodies are kept exactly as they arrived. JSON bodies stay as
//! their original text so that re-encoding a parsed frame reproduces it
//! byte for byte, and so signatures are computed over what the peer sent.

use bytes::Bytes;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Errors converting between payloads and typed messages.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// The payload is not valid JSON for the requested type.
    #[error("payload does not match the expected schema: {0}")]
    Schema(#[from] serde_json::Error),

    /// A typed view was requested of a binary payload.
    #[error("payload is binary, not JSON")]
    Binary,
}

#[derive(Clone)]
enum Body {
    Json(String),
    Binary(Bytes),
}

/// Body of a request, response, or error frame.
///
/// The variant also decides how the enclosing envelope is framed: JSON
/// payloads travel in text frames, binary payloads in binary frames.
#[derive(Clone)]
pub struct Payload(Body);

impl Payload {
    /// The empty JSON object, `{}`.
    #[must_use]
    pub fn empty() -> Self {
        Self(Body::Json("{}".to_string()))
    }

    /// Serialize a typed message into a JSON payload.
    pub fn from_serializable<T: Serialize + ?Sized>(value: &T) -> Result<Self, PayloadError> {
        Ok(Self(Body::Json(serde_json::to_string(value)?)))
    }

    /// Wrap existing JSON text. The text is validated but kept verbatim.
    pub fn from_json_str(json: impl Into<String>) -> Result<Self, PayloadError> {
        let json = json.into();
        serde_json::from_str::<IgnoredAny>(&json)?;
        Ok(Self(Body::Json(json)))
    }

    /// Wrap opaque bytes.
    #[must_use]
    pub fn binary(bytes: impl Into<Bytes>) -> Self {
        Self(Body::Binary(bytes.into()))
    }

    /// Text that the codec has already validated as a single JSON value.
    pub(crate) fn from_validated_json(json: String) -> Self {
        Self(Body::Json(json))
    }

    /// Deserialize the payload into a typed message.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, PayloadError> {
        match &self.0 {
            Body::Json(json) => Ok(serde_json::from_str(json)?),
            Body::Binary(_) => Err(PayloadError::Binary),
        }
    }

    /// JSON text, if this is a JSON payload.
    #[must_use]
    pub fn as_json(&self) -> Option<&str> {
        match &self.0 {
            Body::Json(json) => Some(json),
            Body::Binary(_) => None,
        }
    }

    /// Binary content, if this is a binary payload.
    #[must_use]
    pub fn as_binary(&self) -> Option<&Bytes> {
        match &self.0 {
            Body::Json(_) => None,
            Body::Binary(bytes) => Some(bytes),
        }
    }

    /// Raw bytes of the payload regardless of representation.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match &self.0 {
            Body::Json(json) => json.as_bytes(),
            Body::Binary(bytes) => bytes,
        }
    }

    /// Whether this payload travels in a binary frame.
    #[must_use]
    pub fn is_binary(&self) -> bool {
        matches!(self.0, Body::Binary(_))
    }
}

impl Default for Payload {
    fn default() -> Self {
        Self::empty()
    }
}

impl PartialEq for Payload {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (Body::Json(a), Body::Json(b)) => a == b,
            (Body::Binary(a), Body::Binary(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Payload {}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Body::Json(json) => write!(f, "Json({json})"),
            Body::Binary(bytes) => write!(f, "Binary({} bytes)", bytes.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct Heartbeat {
        current_time: String,
    }

    #[test]
    fn test_typed_round_trip() {
        let msg = Heartbeat {
            current_time: "2024-01-01T00:00:00Z".into(),
        };
        let payload = Payload::from_serializable(&msg).unwrap();
        assert_eq!(
            payload.as_json(),
            Some(r#"{"currentTime":"2024-01-01T00:00:00Z"}"#)
        );
        assert_eq!(payload.deserialize::<Heartbeat>().unwrap(), msg);
    }

    #[test]
    fn test_json_kept_verbatim() {
        let payload = Payload::from_json_str(r#"{ "b": 1,  "a": 2 }"#).unwrap();
        assert_eq!(payload.as_json(), Some(r#"{ "b": 1,  "a": 2 }"#));
    }

    #[test]
    fn test_invalid_json_rejected() {
        assert!(Payload::from_json_str("{not json").is_err());
        assert!(Payload::from_json_str("{} {}").is_err());
    }

    #[test]
    fn test_binary_payload() {
        let payload = Payload::binary(vec![1u8, 2, 3]);
        assert!(payload.is_binary());
        assert_eq!(payload.as_bytes(), &[1, 2, 3]);
        assert!(matches!(
            payload.deserialize::<Heartbeat>(),
            Err(PayloadError::Binary)
        ));
    }

    #[test]
    fn test_equality_distinguishes_representation() {
        let json = Payload::from_json_str("{}").unwrap();
        let bin = Payload::binary(b"{}".to_vec());
        assert_eq!(json, Payload::empty());
        assert_ne!(json, bin);
    }
}

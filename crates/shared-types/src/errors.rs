//! # Error Types
//!
//! The engine-wide failure taxonomy, the error codes carried on the wire,
//! and the typed failure every outbound call resolves with.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Every failure category the adapter engine can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Frame could not be parsed.
    MalformedFrame,
    /// No handler registered for the action at its destination.
    ActionNotSupported,
    /// Signing or verification failed.
    SignatureError,
    /// Forwarding policy rejected the request.
    Filtered,
    /// No response within the deadline.
    Timeout,
    /// Transport-level send failure or connection loss.
    TransmissionFailed,
    /// The caller aborted the wait.
    Cancelled,
    /// A local handler failed unexpectedly.
    HandlerFailed,
}

impl ErrorKind {
    /// The error code used when this failure is reported in an error frame.
    #[must_use]
    pub fn wire_code(self) -> ErrorCode {
        match self {
            ErrorKind::MalformedFrame => ErrorCode::FormationViolation,
            ErrorKind::ActionNotSupported => ErrorCode::NotImplemented,
            ErrorKind::SignatureError => ErrorCode::SecurityError,
            ErrorKind::Filtered => ErrorCode::Filtered,
            ErrorKind::HandlerFailed => ErrorCode::InternalError,
            ErrorKind::Timeout | ErrorKind::TransmissionFailed | ErrorKind::Cancelled => {
                ErrorCode::GenericError
            }
        }
    }

    /// Classify an error code received from a peer.
    ///
    /// Codes without a dedicated category are attributed to the remote
    /// handler.
    #[must_use]
    pub fn from_wire_code(code: &ErrorCode) -> Self {
        match code {
            ErrorCode::FormationViolation
            | ErrorCode::MessageTypeNotSupported
            | ErrorCode::ProtocolError
            | ErrorCode::RpcFrameworkError => ErrorKind::MalformedFrame,
            ErrorCode::NotImplemented | ErrorCode::NotSupported => ErrorKind::ActionNotSupported,
            ErrorCode::SecurityError => ErrorKind::SignatureError,
            ErrorCode::Filtered => ErrorKind::Filtered,
            _ => ErrorKind::HandlerFailed,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Error code carried by `RequestError` and `ResponseError` frames.
///
/// Unknown codes are preserved verbatim so frames re-encode unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ErrorCode {
    FormationViolation,
    GenericError,
    InternalError,
    MessageTypeNotSupported,
    NotImplemented,
    NotSupported,
    OccurrenceConstraintViolation,
    PropertyConstraintViolation,
    ProtocolError,
    RpcFrameworkError,
    SecurityError,
    TypeConstraintViolation,
    /// Forwarding policy rejected the request at a relay.
    Filtered,
    Other(String),
}

impl ErrorCode {
    /// The code as it appears on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            ErrorCode::FormationViolation => "FormationViolation",
            ErrorCode::GenericError => "GenericError",
            ErrorCode::InternalError => "InternalError",
            ErrorCode::MessageTypeNotSupported => "MessageTypeNotSupported",
            ErrorCode::NotImplemented => "NotImplemented",
            ErrorCode::NotSupported => "NotSupported",
            ErrorCode::OccurrenceConstraintViolation => "OccurrenceConstraintViolation",
            ErrorCode::PropertyConstraintViolation => "PropertyConstraintViolation",
            ErrorCode::ProtocolError => "ProtocolError",
            ErrorCode::RpcFrameworkError => "RpcFrameworkError",
            ErrorCode::SecurityError => "SecurityError",
            ErrorCode::TypeConstraintViolation => "TypeConstraintViolation",
            ErrorCode::Filtered => "Filtered",
            ErrorCode::Other(code) => code,
        }
    }
}

impl From<&str> for ErrorCode {
    fn from(code: &str) -> Self {
        match code {
            "FormationViolation" => ErrorCode::FormationViolation,
            "GenericError" => ErrorCode::GenericError,
            "InternalError" => ErrorCode::InternalError,
            "MessageTypeNotSupported" => ErrorCode::MessageTypeNotSupported,
            "NotImplemented" => ErrorCode::NotImplemented,
            "NotSupported" => ErrorCode::NotSupported,
            "OccurrenceConstraintViolation" => ErrorCode::OccurrenceConstraintViolation,
            "PropertyConstraintViolation" => ErrorCode::PropertyConstraintViolation,
            "ProtocolError" => ErrorCode::ProtocolError,
            "RpcFrameworkError" => ErrorCode::RpcFrameworkError,
            "SecurityError" => ErrorCode::SecurityError,
            "TypeConstraintViolation" => ErrorCode::TypeConstraintViolation,
            "Filtered" => ErrorCode::Filtered,
            other => ErrorCode::Other(other.to_string()),
        }
    }
}

impl From<String> for ErrorCode {
    fn from(code: String) -> Self {
        ErrorCode::from(code.as_str())
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> Self {
        code.as_str().to_string()
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed failure an outbound call resolves with.
///
/// Exactly one of these is delivered when a call does not succeed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestFailure {
    /// The response frame could not be parsed.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// The destination has no handler for the action.
    #[error("action not supported: {action}")]
    ActionNotSupported { action: String },

    /// Signing the request or verifying the response failed.
    #[error("signature error: {reason}")]
    SignatureError { reason: String },

    /// A relay's forwarding policy rejected the request.
    #[error("filtered: {reason}")]
    Filtered { reason: String },

    /// No response arrived in time.
    #[error("request timed out after {}ms", after.as_millis())]
    Timeout { after: Duration },

    /// The request could not be transmitted, or the connection closed
    /// before a response arrived.
    #[error("transmission failed: {reason}")]
    TransmissionFailed { reason: String },

    /// The caller aborted the wait.
    #[error("request cancelled")]
    Cancelled,

    /// A local handler failed.
    #[error("handler failed: {reason}")]
    HandlerFailed { reason: String },

    /// The peer answered with an error frame.
    #[error("remote error [{code}]: {description}")]
    Remote {
        code: ErrorCode,
        description: String,
        details: serde_json::Value,
    },
}

impl RequestFailure {
    /// The taxonomy category of this failure.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            RequestFailure::MalformedFrame(_) => ErrorKind::MalformedFrame,
            RequestFailure::ActionNotSupported { .. } => ErrorKind::ActionNotSupported,
            RequestFailure::SignatureError { .. } => ErrorKind::SignatureError,
            RequestFailure::Filtered { .. } => ErrorKind::Filtered,
            RequestFailure::Timeout { .. } => ErrorKind::Timeout,
            RequestFailure::TransmissionFailed { .. } => ErrorKind::TransmissionFailed,
            RequestFailure::Cancelled => ErrorKind::Cancelled,
            RequestFailure::HandlerFailed { .. } => ErrorKind::HandlerFailed,
            RequestFailure::Remote { code, .. } => ErrorKind::from_wire_code(code),
        }
    }
}

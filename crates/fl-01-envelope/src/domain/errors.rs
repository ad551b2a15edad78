//! # Codec Errors

use crate::domain::envelope::{Envelope, ErrorFrame, MessageKind};
use shared_types::{CorrelationId, ErrorCode};
use thiserror::Error;

/// Why a frame failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedReason {
    #[error("frame is empty")]
    Empty,

    #[error("frame is not a JSON array: {0}")]
    NotAnArray(String),

    #[error("message type {0} is not supported")]
    UnsupportedMessageType(String),

    #[error("expected {expected} elements, found {found}")]
    WrongArity { expected: &'static str, found: usize },

    #[error("invalid {field}: {detail}")]
    InvalidField { field: &'static str, detail: String },

    #[error("binary frame truncated while reading {0}")]
    Truncated(&'static str),

    #[error("{0} trailing bytes after binary frame")]
    TrailingBytes(usize),
}

/// A frame that could not be parsed, plus whatever could be recovered
/// from it so the sender can still be told.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed frame: {reason}")]
pub struct MalformedFrame {
    /// Correlation id, if the frame got that far.
    pub correlation_id: Option<CorrelationId>,
    /// Message kind, if the type discriminator was recognised.
    pub kind: Option<MessageKind>,
    pub reason: MalformedReason,
}

impl MalformedFrame {
    pub(crate) fn new(reason: MalformedReason) -> Self {
        Self {
            correlation_id: None,
            kind: None,
            reason,
        }
    }

    pub(crate) fn with_context(
        mut self,
        correlation_id: Option<CorrelationId>,
        kind: Option<MessageKind>,
    ) -> Self {
        self.correlation_id = correlation_id;
        self.kind = kind;
        self
    }

    /// Wire code to report this failure with.
    #[must_use]
    pub fn error_code(&self) -> ErrorCode {
        match self.reason {
            MalformedReason::UnsupportedMessageType(_) => ErrorCode::MessageTypeNotSupported,
            _ => ErrorCode::FormationViolation,
        }
    }

    /// The error envelope to send back, if one can be addressed.
    ///
    /// Broken requests (and frames of unknown type) get a `RequestError`,
    /// broken responses a `ResponseError`. Broken error frames are never
    /// answered.
    #[must_use]
    pub fn reply(&self) -> Option<Envelope> {
        let id = self.correlation_id.clone()?;
        let error = ErrorFrame::new(id, self.error_code(), self.reason.to_string());
        match self.kind {
            None | Some(MessageKind::Request) => Some(Envelope::RequestError(error)),
            Some(MessageKind::Response) => Some(Envelope::ResponseError(error)),
            Some(MessageKind::RequestError | MessageKind::ResponseError) => None,
        }
    }
}

/// Why an envelope could not be encoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("{field} is {len} bytes, binary framing allows at most {max}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("failed to serialize {field}: {detail}")]
    Serialize { field: &'static str, detail: String },
}

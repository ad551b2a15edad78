//! Dispatch error types.

use fl_01_envelope::EncodeError;
use shared_types::{ConnectionId, ErrorCode, NodeId};
use thiserror::Error;

/// Failure handing a frame to the transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("connection {0} is not registered")]
    UnknownConnection(ConnectionId),

    #[error("connection {0} is closed")]
    Closed(ConnectionId),

    #[error("outbound queue of connection {0} is full")]
    QueueFull(ConnectionId),

    #[error("frame could not be encoded: {0}")]
    Encode(#[from] EncodeError),
}

/// Why a handler did not produce a response payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    /// A protocol-level refusal, reported with the given code.
    #[error("[{code}] {description}")]
    Rejected { code: ErrorCode, description: String },

    /// An unexpected failure, reported as `InternalError`.
    #[error("{0}")]
    Failed(String),
}

impl HandlerError {
    #[must_use]
    pub fn rejected(code: ErrorCode, description: impl Into<String>) -> Self {
        Self::Rejected {
            code,
            description: description.into(),
        }
    }

    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }

    /// Code and description for the error frame.
    #[must_use]
    pub fn to_wire(&self) -> (ErrorCode, String) {
        match self {
            Self::Rejected { code, description } => (code.clone(), description.clone()),
            Self::Failed(reason) => (ErrorCode::InternalError, reason.clone()),
        }
    }
}

/// Setup and addressing errors of the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("a handler for action {0} is already registered")]
    DuplicateHandler(String),

    #[error("no route to {0}")]
    NoRoute(NodeId),

    #[error("request has no destination and no connection was given")]
    NoDestination,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

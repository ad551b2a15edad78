//! # Inbound Ports (Driving Ports / API)

use crate::domain::rules::Direction;
use fl_01_envelope::{Envelope, ErrorFrame};
use shared_types::ErrorCode;
use tracing::warn;

/// Outcome of applying the policy to one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignResult {
    /// The message may proceed.
    Pass,
    /// The message must be rejected; the envelope was not modified.
    Fail(String),
}

impl SignResult {
    #[must_use]
    pub fn is_pass(&self) -> bool {
        matches!(self, SignResult::Pass)
    }
}

/// Signature gate used by the dispatcher and the outbound adapter.
pub trait SignaturePolicyApi: Send + Sync {
    /// Sign (outgoing) or verify (incoming) `envelope`.
    ///
    /// `action` is the request's action, or for responses and errors the
    /// action of the request being answered. On `Fail` the envelope is left
    /// exactly as it was.
    fn evaluate(&self, envelope: &mut Envelope, action: &str, direction: Direction) -> SignResult;

    /// Sign a reply to a request with action `action`.
    ///
    /// A reply that cannot be signed is replaced by an unsigned
    /// `SecurityError` request error with the same correlation id and path.
    fn sign_reply(&self, mut reply: Envelope, action: &str) -> Envelope {
        match self.evaluate(&mut reply, action, Direction::Outgoing) {
            SignResult::Pass => reply,
            SignResult::Fail(reason) => {
                warn!(
                    correlation_id = %reply.correlation_id(),
                    action,
                    reason = %reason,
                    "Reply could not be signed, answering with SecurityError"
                );
                let mut error = ErrorFrame::new(
                    reply.correlation_id().clone(),
                    ErrorCode::SecurityError,
                    reason,
                );
                error.header.path = reply.header().path.clone();
                Envelope::RequestError(error)
            }
        }
    }
}

//! What a forwarding filter gets to look at.

use fl_01_envelope::{Envelope, Payload, Request};
use shared_types::{ConnectionId, CorrelationId, ErrorCode, NodeId};

/// An inbound request addressed to another node, as seen by the relay.
#[derive(Debug, Clone)]
pub struct ForwardingContext {
    pub request: Request,
    /// Connection the request arrived on.
    pub connection: ConnectionId,
    /// This node.
    pub local: NodeId,
}

impl ForwardingContext {
    #[must_use]
    pub fn correlation_id(&self) -> &CorrelationId {
        &self.request.correlation_id
    }

    #[must_use]
    pub fn action(&self) -> &str {
        &self.request.action
    }

    #[must_use]
    pub fn destination(&self) -> Option<&NodeId> {
        self.request.destination()
    }

    /// A response to the originator, as a filter would return it from a
    /// custom rejection.
    #[must_use]
    pub fn reply(&self, payload: Payload) -> Envelope {
        Envelope::Response(self.request.reply(&self.local, payload))
    }

    /// An error to the originator.
    #[must_use]
    pub fn error_reply(&self, code: ErrorCode, description: impl Into<String>) -> Envelope {
        Envelope::RequestError(self.request.error_reply(&self.local, code, description))
    }
}

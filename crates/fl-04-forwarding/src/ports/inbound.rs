//! # Inbound Ports (Driving Ports / API)

use crate::domain::decision::ForwardingDecision;
use fl_01_envelope::Request;
use shared_types::ConnectionId;

/// Decides what a relay does with a request that is not for it.
pub trait ForwardingApi: Send + Sync {
    /// Run the filter pipeline for `request`, received on `connection`.
    ///
    /// Synchronous; the decision is final when this returns.
    fn decide(&self, request: Request, connection: ConnectionId) -> ForwardingDecision;
}

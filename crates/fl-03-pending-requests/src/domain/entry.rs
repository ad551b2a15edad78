//! # Pending Entries

use fl_01_envelope::{Envelope, ErrorFrame, Response};
use shared_types::{ConnectionId, CorrelationId, RequestFailure};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tokio::time::Instant;

/// A correlated answer from the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Response(Response),
    RequestError(ErrorFrame),
}

impl Reply {
    #[must_use]
    pub fn correlation_id(&self) -> &CorrelationId {
        match self {
            Reply::Response(r) => &r.correlation_id,
            Reply::RequestError(e) => &e.correlation_id,
        }
    }

    /// The reply as a plain success or typed failure.
    pub fn into_result(self) -> Result<Response, RequestFailure> {
        match self {
            Reply::Response(response) => Ok(response),
            Reply::RequestError(error) => Err(RequestFailure::Remote {
                code: error.code,
                description: error.description,
                details: error
                    .details
                    .deserialize()
                    .unwrap_or(serde_json::Value::Null),
            }),
        }
    }
}

impl From<Reply> for Envelope {
    fn from(reply: Reply) -> Self {
        match reply {
            Reply::Response(r) => Envelope::Response(r),
            Reply::RequestError(e) => Envelope::RequestError(e),
        }
    }
}

/// What a waiter eventually receives.
pub type PendingOutcome = Result<Reply, RequestFailure>;

/// Who is waiting for the answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// A local caller awaiting a `Waiter`.
    Local,
    /// A request relayed on behalf of a peer on this connection.
    Forwarded { from: ConnectionId },
}

/// Identifies an in-flight entry.
///
/// Correlation ids are only unique per initiator. A relay carries requests
/// from several initiators at once, so the id alone is not a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PendingKey {
    pub origin: Origin,
    pub correlation_id: CorrelationId,
}

impl PendingKey {
    /// Key of a request made by a local caller.
    #[must_use]
    pub fn local(correlation_id: CorrelationId) -> Self {
        Self {
            origin: Origin::Local,
            correlation_id,
        }
    }

    /// Key of a request relayed for the peer on `from`.
    #[must_use]
    pub fn forwarded(from: ConnectionId, correlation_id: CorrelationId) -> Self {
        Self {
            origin: Origin::Forwarded { from },
            correlation_id,
        }
    }
}

impl From<CorrelationId> for PendingKey {
    fn from(correlation_id: CorrelationId) -> Self {
        Self::local(correlation_id)
    }
}

impl From<&CorrelationId> for PendingKey {
    fn from(correlation_id: &CorrelationId) -> Self {
        Self::local(correlation_id.clone())
    }
}

/// Read-only view of an in-flight entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingInfo {
    pub correlation_id: CorrelationId,
    pub action: String,
    pub connection: ConnectionId,
    pub origin: Origin,
    pub sent_at: Instant,
    pub timeout: Duration,
}

/// An entry owned by the table from registration until its single
/// terminal transition.
pub(crate) struct PendingRequest {
    pub(crate) action: String,
    pub(crate) connection: ConnectionId,
    pub(crate) origin: Origin,
    pub(crate) sent_at: Instant,
    pub(crate) timeout: Duration,
    /// Distinguishes this registration from later ones reusing the id.
    pub(crate) ticket: u64,
    pub(crate) sender: oneshot::Sender<PendingOutcome>,
    pub(crate) timer: Option<AbortHandle>,
}

impl PendingRequest {
    pub(crate) fn info(&self, key: &PendingKey) -> PendingInfo {
        PendingInfo {
            correlation_id: key.correlation_id.clone(),
            action: self.action.clone(),
            connection: self.connection,
            origin: self.origin,
            sent_at: self.sent_at,
            timeout: self.timeout,
        }
    }
}

//! # Forwarding Decisions
//!
//! Filters return a [`ForwardingResult`] candidate (or nothing). The engine
//! picks one candidate and turns it into an immutable
//! [`ForwardingDecision`], which the dispatcher consumes exactly once via
//! [`ForwardingDecision::into_disposition`].

use fl_01_envelope::{Envelope, Request};
use shared_bus::{AdapterEvent, EventPublisher, ForwardingOutcome, ObserverList};
use shared_types::{ConnectionId, CorrelationId, NodeId};
use std::fmt;
use std::sync::Arc;

/// A filter's verdict on one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardingResult {
    /// Pass the request on unchanged.
    Forward,
    /// Answer the originator instead of passing the request on. Without a
    /// response the originator gets a `Filtered` request error.
    Reject { response: Option<Envelope> },
    /// Pass on this request instead. It keeps the original correlation id.
    Replace { request: Request },
}

impl ForwardingResult {
    #[must_use]
    pub fn reject() -> Self {
        Self::Reject { response: None }
    }

    #[must_use]
    pub fn reject_with(response: Envelope) -> Self {
        Self::Reject {
            response: Some(response),
        }
    }

    #[must_use]
    pub fn replace(request: Request) -> Self {
        Self::Replace { request }
    }

    #[must_use]
    pub fn outcome(&self) -> ForwardingOutcome {
        match self {
            Self::Forward => ForwardingOutcome::Forward,
            Self::Reject { .. } => ForwardingOutcome::Reject,
            Self::Replace { .. } => ForwardingOutcome::Replace,
        }
    }

    /// Reject > Replace > Forward.
    fn restrictiveness(&self) -> u8 {
        match self {
            Self::Forward => 0,
            Self::Replace { .. } => 1,
            Self::Reject { .. } => 2,
        }
    }
}

/// A filter's result tagged with where it came from.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub filter: String,
    pub priority: i32,
    /// Registration position of the filter.
    pub index: usize,
    pub result: ForwardingResult,
}

/// Pick the winning candidate.
///
/// Highest priority wins. Equal priorities go to the most restrictive
/// result, and remaining ties to the earliest registered filter.
#[must_use]
pub fn select(candidates: Vec<Candidate>) -> Option<Candidate> {
    candidates.into_iter().max_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| a.result.restrictiveness().cmp(&b.result.restrictiveness()))
            .then_with(|| b.index.cmp(&a.index))
    })
}

/// The finalized action. Rejections always carry the (signed) response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Verdict {
    Forward,
    Replace(Request),
    Reject(Envelope),
}

/// Reported to `sent` observers once the transport has been tried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotice {
    pub correlation_id: CorrelationId,
    pub action: String,
    pub outcome: ForwardingOutcome,
    /// Hop the request was handed to, if it got that far.
    pub next_hop: Option<NodeId>,
    /// Transport error, if sending failed.
    pub error: Option<String>,
}

/// Finalized decision for one relayed request.
pub struct ForwardingDecision {
    pub(crate) request: Request,
    pub(crate) connection: ConnectionId,
    pub(crate) verdict: Verdict,
    pub(crate) decided_by: Option<String>,
    pub(crate) log_message: String,
    pub(crate) sent: Arc<ObserverList<SentNotice>>,
    pub(crate) events: Arc<dyn EventPublisher>,
}

/// What the dispatcher must do with a decision.
#[derive(Debug)]
pub enum Disposition {
    /// Send `request` toward its destination, then report through `receipt`.
    Transmit {
        request: Request,
        receipt: SendReceipt,
    },
    /// Send `response` back on the connection the request came from.
    Respond { response: Envelope },
}

impl ForwardingDecision {
    #[must_use]
    pub fn correlation_id(&self) -> &CorrelationId {
        &self.request.correlation_id
    }

    #[must_use]
    pub fn action(&self) -> &str {
        &self.request.action
    }

    /// Connection the request arrived on.
    #[must_use]
    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    #[must_use]
    pub fn outcome(&self) -> ForwardingOutcome {
        match self.verdict {
            Verdict::Forward => ForwardingOutcome::Forward,
            Verdict::Replace(_) => ForwardingOutcome::Replace,
            Verdict::Reject(_) => ForwardingOutcome::Reject,
        }
    }

    /// Name of the filter whose result was used. `None` means the default
    /// policy decided.
    #[must_use]
    pub fn decided_by(&self) -> Option<&str> {
        self.decided_by.as_deref()
    }

    #[must_use]
    pub fn log_message(&self) -> &str {
        &self.log_message
    }

    /// The request as received.
    #[must_use]
    pub fn original_request(&self) -> &Request {
        &self.request
    }

    /// The rewritten request, for `Replace`.
    #[must_use]
    pub fn replacement(&self) -> Option<&Request> {
        match &self.verdict {
            Verdict::Replace(request) => Some(request),
            _ => None,
        }
    }

    /// The response sent to the originator, for `Reject`.
    #[must_use]
    pub fn rejection(&self) -> Option<&Envelope> {
        match &self.verdict {
            Verdict::Reject(response) => Some(response),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_disposition(self) -> Disposition {
        let outcome = self.outcome();
        let request = match self.verdict {
            Verdict::Reject(response) => return Disposition::Respond { response },
            Verdict::Forward => self.request,
            Verdict::Replace(replacement) => replacement,
        };
        Disposition::Transmit {
            receipt: SendReceipt {
                correlation_id: request.correlation_id.clone(),
                action: request.action.clone(),
                outcome,
                sent: self.sent,
                events: self.events,
            },
            request,
        }
    }
}

impl fmt::Debug for ForwardingDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForwardingDecision")
            .field("correlation_id", self.correlation_id())
            .field("action", &self.action())
            .field("outcome", &self.outcome())
            .field("decided_by", &self.decided_by)
            .finish()
    }
}

/// Send-result callback for a transmitted decision.
///
/// `sent` observers fire when the dispatcher reports the transport result,
/// never at decision time.
pub struct SendReceipt {
    correlation_id: CorrelationId,
    action: String,
    outcome: ForwardingOutcome,
    sent: Arc<ObserverList<SentNotice>>,
    events: Arc<dyn EventPublisher>,
}

impl SendReceipt {
    /// The frame was handed to the transport for `next_hop`.
    pub fn delivered(self, next_hop: NodeId) {
        self.events.publish(AdapterEvent::RequestForwarded {
            correlation_id: self.correlation_id.clone(),
            action: self.action.clone(),
            next_hop: next_hop.clone(),
        });
        self.notify(Some(next_hop), None);
    }

    /// The frame could not be sent.
    pub fn failed(self, next_hop: Option<NodeId>, error: impl Into<String>) {
        self.notify(next_hop, Some(error.into()));
    }

    fn notify(self, next_hop: Option<NodeId>, error: Option<String>) {
        self.sent.notify(&SentNotice {
            correlation_id: self.correlation_id,
            action: self.action,
            outcome: self.outcome,
            next_hop,
            error,
        });
    }
}

impl fmt::Debug for SendReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendReceipt")
            .field("correlation_id", &self.correlation_id)
            .field("outcome", &self.outcome)
            .finish()
    }
}

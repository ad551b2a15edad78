//! # Adapter Events
//!
//! Lifecycle events published by the adapter subsystems. External sinks
//! (logging exporters, dashboards, tests) subscribe to these instead of
//! hooking into the engine directly.

use serde::{Deserialize, Serialize};
use shared_types::{ConnectionId, CorrelationId, ErrorCode, ErrorKind, NodeId};

/// Final outcome of a forwarding decision, as reported on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ForwardingOutcome {
    /// The request was passed on unchanged.
    Forward,
    /// The request was rewritten before being passed on.
    Replace,
    /// The request was answered at the relay and not passed on.
    Reject,
}

/// All events that can be published to the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AdapterEvent {
    // =========================================================================
    // CONNECTIONS
    // =========================================================================
    /// A transport connection was attached to the adapter.
    ConnectionOpened { connection: ConnectionId },

    /// A transport connection was closed.
    ConnectionClosed {
        connection: ConnectionId,
        reason: String,
    },

    /// An inbound frame could not be parsed.
    FrameRejected {
        connection: ConnectionId,
        correlation_id: Option<CorrelationId>,
        reason: String,
    },

    // =========================================================================
    // PENDING REQUESTS
    // =========================================================================
    /// An outbound request is now awaiting its response.
    RequestRegistered {
        correlation_id: CorrelationId,
        action: String,
        connection: ConnectionId,
    },

    /// A pending request received its response.
    RequestCompleted {
        correlation_id: CorrelationId,
        action: String,
        elapsed_ms: u64,
    },

    /// A pending request terminated without a response.
    RequestFailed {
        correlation_id: CorrelationId,
        action: String,
        kind: ErrorKind,
    },

    /// A response arrived for an id with no pending entry.
    ResponseDiscarded {
        correlation_id: CorrelationId,
        connection: Option<ConnectionId>,
    },

    // =========================================================================
    // FORWARDING
    // =========================================================================
    /// The forwarding engine finalized a decision.
    ForwardingDecided {
        correlation_id: CorrelationId,
        action: String,
        outcome: ForwardingOutcome,
    },

    /// A forwarded request was handed to the transport.
    RequestForwarded {
        correlation_id: CorrelationId,
        action: String,
        next_hop: NodeId,
    },

    // =========================================================================
    // SIGNATURES & DISPATCH
    // =========================================================================
    /// A message failed its signature gate.
    SignatureRejected {
        correlation_id: CorrelationId,
        action: String,
        reason: String,
    },

    /// A local handler produced a reply.
    RequestHandled {
        correlation_id: CorrelationId,
        action: String,
        error_code: Option<ErrorCode>,
    },

    /// A peer reported an error about a response we sent.
    RemoteErrorReported {
        correlation_id: CorrelationId,
        code: ErrorCode,
        description: String,
    },
}

impl AdapterEvent {
    /// Get the topic for this event (for filtering).
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::ConnectionOpened { .. }
            | Self::ConnectionClosed { .. }
            | Self::FrameRejected { .. } => EventTopic::Connections,
            Self::RequestRegistered { .. }
            | Self::RequestCompleted { .. }
            | Self::RequestFailed { .. }
            | Self::ResponseDiscarded { .. } => EventTopic::Pending,
            Self::ForwardingDecided { .. } | Self::RequestForwarded { .. } => {
                EventTopic::Forwarding
            }
            Self::SignatureRejected { .. } => EventTopic::Signatures,
            Self::RequestHandled { .. } | Self::RemoteErrorReported { .. } => EventTopic::Dispatch,
        }
    }

    /// Correlation id the event concerns, if any.
    #[must_use]
    pub fn correlation_id(&self) -> Option<&CorrelationId> {
        match self {
            Self::ConnectionOpened { .. } | Self::ConnectionClosed { .. } => None,
            Self::FrameRejected { correlation_id, .. } => correlation_id.as_ref(),
            Self::RequestRegistered { correlation_id, .. }
            | Self::RequestCompleted { correlation_id, .. }
            | Self::RequestFailed { correlation_id, .. }
            | Self::ResponseDiscarded { correlation_id, .. }
            | Self::ForwardingDecided { correlation_id, .. }
            | Self::RequestForwarded { correlation_id, .. }
            | Self::SignatureRejected { correlation_id, .. }
            | Self::RequestHandled { correlation_id, .. }
            | Self::RemoteErrorReported { correlation_id, .. } => Some(correlation_id),
        }
    }
}

/// Event topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Connection lifecycle and frame parsing.
    Connections,
    /// Pending-request table transitions.
    Pending,
    /// Forwarding decisions and relayed sends.
    Forwarding,
    /// Signature gate failures.
    Signatures,
    /// Local handling and peer error reports.
    Dispatch,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
    /// Correlation ids to include. Empty means all ids.
    pub correlation_ids: Vec<CorrelationId>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            correlation_ids: Vec::new(),
        }
    }

    /// Create a filter for events about specific requests.
    #[must_use]
    pub fn for_requests(ids: Vec<CorrelationId>) -> Self {
        Self {
            topics: Vec::new(),
            correlation_ids: ids,
        }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &AdapterEvent) -> bool {
        let topic_match = self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic());

        let id_match = self.correlation_ids.is_empty()
            || event
                .correlation_id()
                .is_some_and(|id| self.correlation_ids.contains(id));

        topic_match && id_match
    }
}

//! # Envelopes
//!
//! The four message shapes of the protocol. Every envelope carries the
//! correlation id chosen by the initiator of the exchange and a routing
//! header; requests also carry an action name.

use crate::domain::header::{Header, Signature};
use crate::domain::payload::Payload;
use serde::{Deserialize, Serialize};
use shared_types::{CorrelationId, ErrorCode, NetworkPath, NodeId, SourceRouting};

/// Discriminator of the four envelope shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    Request,
    Response,
    RequestError,
    ResponseError,
}

impl MessageKind {
    /// Leading type number on the wire.
    #[must_use]
    pub const fn type_id(self) -> u8 {
        match self {
            MessageKind::Request => 2,
            MessageKind::Response => 3,
            MessageKind::RequestError => 4,
            MessageKind::ResponseError => 5,
        }
    }

    /// Classify a wire type number.
    #[must_use]
    pub fn from_type_id(type_id: u64) -> Option<Self> {
        match type_id {
            2 => Some(MessageKind::Request),
            3 => Some(MessageKind::Response),
            4 => Some(MessageKind::RequestError),
            5 => Some(MessageKind::ResponseError),
            _ => None,
        }
    }
}

// =============================================================================
// REQUEST
// =============================================================================

/// A call: ask the destination to perform `action`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub correlation_id: CorrelationId,
    pub action: String,
    pub payload: Payload,
    pub header: Header,
}

impl Request {
    /// New request with a freshly generated correlation id and no routing.
    #[must_use]
    pub fn new(action: impl Into<String>, payload: Payload) -> Self {
        Self {
            correlation_id: CorrelationId::generate(),
            action: action.into(),
            payload,
            header: Header::default(),
        }
    }

    #[must_use]
    pub fn with_correlation_id(mut self, id: impl Into<CorrelationId>) -> Self {
        self.correlation_id = id.into();
        self
    }

    /// Address the request to a final destination.
    #[must_use]
    pub fn with_destination(mut self, destination: NodeId) -> Self {
        self.header.routing = Some(SourceRouting::Destination(destination));
        self
    }

    #[must_use]
    pub fn with_routing(mut self, routing: SourceRouting) -> Self {
        self.header.routing = Some(routing);
        self
    }

    #[must_use]
    pub fn with_path(mut self, path: NetworkPath) -> Self {
        self.header.path = path;
        self
    }

    /// Final destination named in the routing header.
    #[must_use]
    pub fn destination(&self) -> Option<&NodeId> {
        self.header.routing.as_ref().and_then(SourceRouting::final_destination)
    }

    /// True if the request terminates at `local`. A request without
    /// routing information is addressed to whoever receives it.
    #[must_use]
    pub fn is_addressed_to(&self, local: &NodeId) -> bool {
        match &self.header.routing {
            None => true,
            Some(routing) => routing.is_addressed_to(local),
        }
    }

    /// Build the response `local` sends for this request.
    #[must_use]
    pub fn reply(&self, local: &NodeId, payload: Payload) -> Response {
        Response {
            correlation_id: self.correlation_id.clone(),
            payload,
            header: Header {
                routing: None,
                path: self.header.path.response_path(local),
                signatures: Vec::new(),
            },
        }
    }

    /// Build the request error `local` sends for this request.
    #[must_use]
    pub fn error_reply(
        &self,
        local: &NodeId,
        code: ErrorCode,
        description: impl Into<String>,
    ) -> ErrorFrame {
        let mut error = ErrorFrame::new(self.correlation_id.clone(), code, description);
        error.header.path = self.header.path.response_path(local);
        error
    }
}

// =============================================================================
// RESPONSE
// =============================================================================

/// A successful result for the request with the same correlation id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub correlation_id: CorrelationId,
    pub payload: Payload,
    pub header: Header,
}

impl Response {
    #[must_use]
    pub fn new(correlation_id: impl Into<CorrelationId>, payload: Payload) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            payload,
            header: Header::default(),
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Body of both `RequestError` and `ResponseError` envelopes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorFrame {
    pub correlation_id: CorrelationId,
    pub code: ErrorCode,
    pub description: String,
    pub details: Payload,
    pub header: Header,
}

impl ErrorFrame {
    /// Error with empty details.
    #[must_use]
    pub fn new(
        correlation_id: impl Into<CorrelationId>,
        code: ErrorCode,
        description: impl Into<String>,
    ) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            code,
            description: description.into(),
            details: Payload::empty(),
            header: Header::default(),
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: Payload) -> Self {
        self.details = details;
        self
    }
}

// =============================================================================
// ENVELOPE
// =============================================================================

/// Any parsed frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    Request(Request),
    Response(Response),
    /// The receiver could not process a request.
    RequestError(ErrorFrame),
    /// The receiver of a response reports a problem with it.
    ResponseError(ErrorFrame),
}

impl Envelope {
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        match self {
            Envelope::Request(_) => MessageKind::Request,
            Envelope::Response(_) => MessageKind::Response,
            Envelope::RequestError(_) => MessageKind::RequestError,
            Envelope::ResponseError(_) => MessageKind::ResponseError,
        }
    }

    #[must_use]
    pub fn correlation_id(&self) -> &CorrelationId {
        match self {
            Envelope::Request(r) => &r.correlation_id,
            Envelope::Response(r) => &r.correlation_id,
            Envelope::RequestError(e) | Envelope::ResponseError(e) => &e.correlation_id,
        }
    }

    pub fn correlation_id_mut(&mut self) -> &mut CorrelationId {
        match self {
            Envelope::Request(r) => &mut r.correlation_id,
            Envelope::Response(r) => &mut r.correlation_id,
            Envelope::RequestError(e) | Envelope::ResponseError(e) => &mut e.correlation_id,
        }
    }

    /// Action name, for requests.
    #[must_use]
    pub fn action(&self) -> Option<&str> {
        match self {
            Envelope::Request(r) => Some(&r.action),
            _ => None,
        }
    }

    #[must_use]
    pub fn header(&self) -> &Header {
        match self {
            Envelope::Request(r) => &r.header,
            Envelope::Response(r) => &r.header,
            Envelope::RequestError(e) | Envelope::ResponseError(e) => &e.header,
        }
    }

    pub fn header_mut(&mut self) -> &mut Header {
        match self {
            Envelope::Request(r) => &mut r.header,
            Envelope::Response(r) => &mut r.header,
            Envelope::RequestError(e) | Envelope::ResponseError(e) => &mut e.header,
        }
    }

    /// The signed body: the payload, or the details of an error.
    #[must_use]
    pub fn payload(&self) -> &Payload {
        match self {
            Envelope::Request(r) => &r.payload,
            Envelope::Response(r) => &r.payload,
            Envelope::RequestError(e) | Envelope::ResponseError(e) => &e.details,
        }
    }

    #[must_use]
    pub fn signatures(&self) -> &[Signature] {
        &self.header().signatures
    }

    /// Whether the envelope is framed as binary on the wire.
    #[must_use]
    pub fn is_binary(&self) -> bool {
        self.payload().is_binary()
    }
}

impl From<Request> for Envelope {
    fn from(request: Request) -> Self {
        Envelope::Request(request)
    }
}

impl From<Response> for Envelope {
    fn from(response: Response) -> Self {
        Envelope::Response(response)
    }
}

//! # Outbound Ports (Driven Ports)

use crate::domain::errors::{HandlerError, TransportError};
use async_trait::async_trait;
use fl_01_envelope::{Frame, Payload, Request};
use shared_types::{ConnectionId, NodeId};

/// Hands encoded frames to a connection.
///
/// Must not block: implementations queue the frame for the connection's
/// writer and return.
pub trait Transport: Send + Sync {
    fn send_frame(&self, connection: ConnectionId, frame: Frame) -> Result<(), TransportError>;
}

/// Where a request being handled came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerContext {
    /// This node.
    pub local: NodeId,
    /// Connection the request arrived on.
    pub connection: ConnectionId,
    /// First hop of the request's path, if it carries one.
    pub origin: Option<NodeId>,
}

/// Business logic for one action.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Produce the response payload for `request`.
    async fn handle(&self, request: Request, context: HandlerContext)
        -> Result<Payload, HandlerError>;
}

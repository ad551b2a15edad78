//! # Routing Entities
//!
//! Identifiers and source-routing values carried inside envelopes.
//!
//! ## Clusters
//!
//! - **Identity**: `NodeId`, `ConnectionId`
//! - **Routing**: `NetworkPath`, `SourceRouting`

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

// =============================================================================
// IDENTITY
// =============================================================================

/// Rejected node identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeIdError {
    /// Identifiers must contain at least one character.
    #[error("node id must not be empty")]
    Empty,
}

/// Opaque identifier of a protocol participant (device, relay or
/// management system). Equality is by identifier string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId(String);

impl NodeId {
    /// Create a node id, rejecting the empty string.
    pub fn new(id: impl Into<String>) -> Result<Self, NodeIdError> {
        let id = id.into();
        if id.is_empty() {
            return Err(NodeIdError::Empty);
        }
        Ok(Self(id))
    }

    /// Get the identifier string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for NodeId {
    type Error = NodeIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for NodeId {
    type Error = NodeIdError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifier of one live transport connection.
///
/// Uses UUID v7 so connection ids sort by creation time in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Allocate a fresh connection id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// ROUTING
// =============================================================================

/// Ordered, append-only list of the hops a message has traversed, oldest
/// first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkPath(Vec<NodeId>);

impl NetworkPath {
    /// An empty path.
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Build a path from hops, oldest first.
    #[must_use]
    pub fn from_hops(hops: Vec<NodeId>) -> Self {
        Self(hops)
    }

    /// Append a hop.
    pub fn push(&mut self, hop: NodeId) {
        self.0.push(hop);
    }

    /// Return a copy of this path with `hop` appended.
    #[must_use]
    pub fn with_hop(&self, hop: NodeId) -> Self {
        let mut path = self.clone();
        path.push(hop);
        path
    }

    /// All hops, oldest first.
    #[must_use]
    pub fn hops(&self) -> &[NodeId] {
        &self.0
    }

    /// Number of hops.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if no hop was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The node that originated the message, if recorded.
    #[must_use]
    pub fn origin(&self) -> Option<&NodeId> {
        self.0.first()
    }

    /// The most recent hop.
    #[must_use]
    pub fn last(&self) -> Option<&NodeId> {
        self.0.last()
    }

    /// True if `node` appears anywhere on the path.
    #[must_use]
    pub fn contains(&self, node: &NodeId) -> bool {
        self.0.contains(node)
    }

    /// The path in reverse order.
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self(self.0.iter().rev().cloned().collect())
    }

    /// The path a response to a request that travelled along `self` must
    /// carry: the responder is appended, then the whole path is reversed.
    #[must_use]
    pub fn response_path(&self, responder: &NodeId) -> Self {
        self.with_hop(responder.clone()).reversed()
    }

    /// The hop that follows `node` on this path.
    ///
    /// If `node` is not on the path, the first hop is returned so that an
    /// originator can send along an explicit route that omits itself.
    #[must_use]
    pub fn next_hop_after(&self, node: &NodeId) -> Option<&NodeId> {
        match self.0.iter().position(|hop| hop == node) {
            Some(index) => self.0.get(index + 1),
            None => self.0.first(),
        }
    }
}

impl From<Vec<NodeId>> for NetworkPath {
    fn from(hops: Vec<NodeId>) -> Self {
        Self(hops)
    }
}

impl fmt::Display for NetworkPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hops: Vec<&str> = self.0.iter().map(NodeId::as_str).collect();
        write!(f, "[{}]", hops.join(" -> "))
    }
}

/// Addressing of a message: a final destination, or an explicit path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceRouting {
    /// Send to this node; intermediate hops come from the routing table.
    Destination(NodeId),
    /// Send along exactly these hops; the last hop is the destination.
    Path(NetworkPath),
}

impl SourceRouting {
    /// The node the message is ultimately addressed to.
    #[must_use]
    pub fn final_destination(&self) -> Option<&NodeId> {
        match self {
            SourceRouting::Destination(node) => Some(node),
            SourceRouting::Path(path) => path.last(),
        }
    }

    /// True if the message terminates at `local`.
    #[must_use]
    pub fn is_addressed_to(&self, local: &NodeId) -> bool {
        self.final_destination() == Some(local)
    }

    /// The next node the message should be handed to when leaving `local`.
    ///
    /// For destination routing the destination itself is returned; the
    /// caller resolves it to a connection through its routing table.
    #[must_use]
    pub fn next_hop(&self, local: &NodeId) -> Option<&NodeId> {
        match self {
            SourceRouting::Destination(node) => Some(node),
            SourceRouting::Path(path) => path.next_hop_after(local),
        }
    }
}

impl From<NodeId> for SourceRouting {
    fn from(node: NodeId) -> Self {
        SourceRouting::Destination(node)
    }
}

impl From<NetworkPath> for SourceRouting {
    fn from(path: NetworkPath) -> Self {
        SourceRouting::Path(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str) -> NodeId {
        NodeId::new(id).unwrap()
    }

    #[test]
    fn test_empty_node_id_rejected() {
        assert_eq!(NodeId::new(""), Err(NodeIdError::Empty));
        assert!(serde_json::from_str::<NodeId>("\"\"").is_err());
    }

    #[test]
    fn test_node_id_equality_by_string() {
        assert_eq!(node("CS-1"), node("CS-1"));
        assert_ne!(node("CS-1"), node("cs-1"));
    }

    #[test]
    fn test_response_path_is_reverse_with_responder() {
        let request_path = NetworkPath::from_hops(vec![node("CSMS"), node("LC-1")]);
        let response_path = request_path.response_path(&node("CS-7"));

        assert_eq!(
            response_path.hops(),
            &[node("CS-7"), node("LC-1"), node("CSMS")]
        );
    }

    #[test]
    fn test_next_hop_after() {
        let path = NetworkPath::from_hops(vec![node("A"), node("B"), node("C")]);
        assert_eq!(path.next_hop_after(&node("A")), Some(&node("B")));
        assert_eq!(path.next_hop_after(&node("C")), None);
        assert_eq!(path.next_hop_after(&node("Z")), Some(&node("A")));
    }

    #[test]
    fn test_source_routing_destination() {
        let routing = SourceRouting::Path(NetworkPath::from_hops(vec![node("R"), node("D")]));
        assert_eq!(routing.final_destination(), Some(&node("D")));
        assert!(routing.is_addressed_to(&node("D")));
        assert_eq!(routing.next_hop(&node("R")), Some(&node("D")));
    }

    #[test]
    fn test_source_routing_serialization() {
        let routing = SourceRouting::Destination(node("CS-1"));
        let json = serde_json::to_string(&routing).unwrap();
        assert_eq!(json, r#"{"destination":"CS-1"}"#);

        let parsed: SourceRouting = serde_json::from_str(r#"{"path":["A","B"]}"#).unwrap();
        assert_eq!(parsed.final_destination(), Some(&node("B")));
    }

    #[test]
    fn test_connection_ids_unique() {
        assert_ne!(ConnectionId::new(), ConnectionId::new());
    }
}

//! # Routing Table
//!
//! Maps node ids to the connection that leads toward them. A direct peer
//! maps to its own connection; a node behind a relay maps to the relay's
//! connection. The optional default route catches everything else (a
//! device's uplink, for example).

use dashmap::DashMap;
use fl_01_envelope::Request;
use parking_lot::RwLock;
use shared_types::{ConnectionId, NodeId, SourceRouting};
use tracing::debug;

/// Next hop chosen for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub next_hop: NodeId,
    pub connection: ConnectionId,
}

#[derive(Debug, Default)]
pub struct RoutingTable {
    routes: DashMap<NodeId, ConnectionId>,
    default: RwLock<Option<ConnectionId>>,
}

impl RoutingTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reach `node` through `connection`, replacing any earlier route.
    pub fn add_route(&self, node: NodeId, connection: ConnectionId) {
        debug!(node = %node, connection = %connection, "Route added");
        self.routes.insert(node, connection);
    }

    pub fn remove_route(&self, node: &NodeId) -> Option<ConnectionId> {
        self.routes.remove(node).map(|(_, connection)| connection)
    }

    /// Route everything without an explicit entry through `connection`.
    pub fn set_default_route(&self, connection: Option<ConnectionId>) {
        *self.default.write() = connection;
    }

    /// Drop every route through `connection`. Returns how many went.
    pub fn remove_connection(&self, connection: ConnectionId) -> usize {
        let before = self.routes.len();
        self.routes.retain(|_, c| *c != connection);
        let mut default = self.default.write();
        if *default == Some(connection) {
            *default = None;
        }
        before - self.routes.len()
    }

    /// Connection toward `node`, falling back to the default route.
    #[must_use]
    pub fn lookup(&self, node: &NodeId) -> Option<ConnectionId> {
        self.routes
            .get(node)
            .map(|entry| *entry.value())
            .or_else(|| *self.default.read())
    }

    #[must_use]
    pub fn default_route(&self) -> Option<ConnectionId> {
        *self.default.read()
    }

    /// Next hop and connection for `request` as seen from `local`.
    #[must_use]
    pub fn resolve(&self, request: &Request, local: &NodeId) -> Option<Route> {
        self.resolve_routing(request.header.routing.as_ref()?, local)
    }

    /// Next hop and connection for `routing` as seen from `local`.
    ///
    /// Explicit paths name the hop after `local`; plain destinations are
    /// looked up directly.
    #[must_use]
    pub fn resolve_routing(&self, routing: &SourceRouting, local: &NodeId) -> Option<Route> {
        let next_hop = routing.next_hop(local)?.clone();
        let connection = self.lookup(&next_hop)?;
        Some(Route {
            next_hop,
            connection,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

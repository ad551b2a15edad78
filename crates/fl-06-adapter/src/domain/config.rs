//! Adapter configuration with validation.

use fl_02_signature_policy::{PolicySnapshot, SignaturesConfig};
use fl_04_forwarding::ForwardingConfig;
use serde::{Deserialize, Serialize};
use shared_types::NodeId;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Default maximum WebSocket message size (1MB)
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Main adapter configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AdapterConfig {
    /// Identity of this node
    pub node: NodeConfig,
    /// Outbound and relay timeouts
    pub timeouts: TimeoutConfig,
    /// Relay forwarding policy
    pub forwarding: ForwardingConfig,
    /// Signing and verification rules plus key material
    pub signatures: SignaturesConfig,
    /// WebSocket server
    pub websocket: WebSocketConfig,
}

impl AdapterConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node.id.is_none() {
            return Err(ConfigError::MissingNodeId);
        }

        if self.timeouts.default_ms == 0 {
            return Err(ConfigError::InvalidTimeout("defaultMs cannot be 0".into()));
        }
        if self.timeouts.relay_ms == 0 {
            return Err(ConfigError::InvalidTimeout("relayMs cannot be 0".into()));
        }
        if let Some((action, _)) = self.timeouts.per_action.iter().find(|(_, ms)| **ms == 0) {
            return Err(ConfigError::InvalidTimeout(format!(
                "timeout for {action} cannot be 0"
            )));
        }

        if self.websocket.max_message_size == 0 {
            return Err(ConfigError::InvalidLimit(
                "maxMessageSize cannot be 0".into(),
            ));
        }
        if self.websocket.outbound_buffer == 0 {
            return Err(ConfigError::InvalidLimit(
                "outboundBuffer cannot be 0".into(),
            ));
        }

        PolicySnapshot::from_config(&self.signatures)
            .map_err(|e| ConfigError::Signatures(e.to_string()))?;

        Ok(())
    }

    /// The configured node id.
    pub fn node_id(&self) -> Result<NodeId, ConfigError> {
        self.node.id.clone().ok_or(ConfigError::MissingNodeId)
    }
}

/// Node identity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub id: Option<NodeId>,
}

/// Timeout configuration, in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TimeoutConfig {
    /// Timeout for outbound calls without an override
    pub default_ms: u64,
    /// How long a relay waits for the answer to a forwarded request
    pub relay_ms: u64,
    /// Per-action overrides
    pub per_action: HashMap<String, u64>,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default_ms: 30_000,
            relay_ms: 30_000,
            per_action: HashMap::new(),
        }
    }
}

impl TimeoutConfig {
    /// Timeout for an outbound request with `action`.
    #[must_use]
    pub fn for_action(&self, action: &str) -> Duration {
        let ms = self
            .per_action
            .get(action)
            .copied()
            .unwrap_or(self.default_ms);
        Duration::from_millis(ms)
    }

    #[must_use]
    pub fn relay(&self) -> Duration {
        Duration::from_millis(self.relay_ms)
    }
}

/// WebSocket server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WebSocketConfig {
    /// Enable WebSocket server
    pub enabled: bool,
    /// Bind address
    pub host: IpAddr,
    /// Port (default: 9000)
    pub port: u16,
    /// Maximum inbound message size in bytes
    pub max_message_size: usize,
    /// Frames queued per connection before sends fail
    pub outbound_buffer: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 9000,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            outbound_buffer: 256,
        }
    }
}

impl WebSocketConfig {
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// `node.id` is not set
    #[error("node id is not configured")]
    MissingNodeId,
    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    /// Invalid size or count limit
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    /// Rules or keys do not form a usable policy
    #[error("invalid signature configuration: {0}")]
    Signatures(String),
}

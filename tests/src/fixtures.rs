//! # Shared Fixtures
//!
//! A CSMS, a relay and a device (`cp-1`) wired together in process:
//!
//! ```text
//!   csms  <──uplink──>  relay  <──downlink──>  cp-1
//! ```

use fl_01_envelope::{Payload, Request, SignatureAlgorithm};
use fl_02_signature_policy::{KeyConfig, SignatureRequirement, SignaturesConfig};
use fl_05_dispatch::{handler_fn, HandlerError, HandlerRegistry};
use fl_06_adapter::{
    Adapter, AdapterBuilder, AdapterConfig, ChannelLink, ChannelTransport, NodeConfig,
    WebSocketConfig,
};
use serde::{Deserialize, Serialize};
use shared_types::NodeId;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const CSMS: &str = "csms";
pub const RELAY: &str = "relay";
pub const DEVICE: &str = "cp-1";

/// Secret every node of a signed topology shares.
pub const SHARED_SECRET_HEX: &str =
    "6669656c646c696e6b2d696e746567726174696f6e2d7365637265742d303031";

pub fn node(id: &str) -> NodeId {
    NodeId::new(id).unwrap()
}

/// Config for `id` with the WebSocket server off.
pub fn config(id: &str) -> AdapterConfig {
    AdapterConfig {
        node: NodeConfig { id: Some(node(id)) },
        websocket: WebSocketConfig {
            enabled: false,
            ..WebSocketConfig::default()
        },
        ..AdapterConfig::default()
    }
}

/// Sign everything outgoing and verify everything incoming with the shared
/// HMAC key.
pub fn signed(mut config: AdapterConfig) -> AdapterConfig {
    config.signatures = SignaturesConfig {
        default_requirement: SignatureRequirement::SignAndVerify,
        rules: Vec::new(),
        keys: vec![KeyConfig {
            id: "shared".into(),
            algorithm: SignatureAlgorithm::HmacSha256,
            secret_hex: Some(SHARED_SECRET_HEX.into()),
            public_hex: None,
        }],
    };
    config
}

// =============================================================================
// DEVICE HANDLERS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delay {
    pub ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slept {
    pub slept: u64,
}

/// Handlers a device exposes. Every invocation bumps `calls`.
///
/// - `Echo` returns its payload
/// - `Delay` sleeps for `ms` and reports it
/// - `Hang` never answers
/// - `Reset` returns `{"status":"Accepted"}`
pub fn device_handlers(calls: Arc<AtomicUsize>) -> HandlerRegistry {
    let echo_calls = calls.clone();
    let delay_calls = calls.clone();
    let hang_calls = calls.clone();
    let reset_calls = calls;

    HandlerRegistry::builder()
        .register(
            "Echo",
            handler_fn(move |request: Request, _| {
                echo_calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok::<_, HandlerError>(request.payload) }
            }),
        )
        .unwrap()
        .register(
            "Delay",
            handler_fn(move |request: Request, _| {
                delay_calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    let delay: Delay = request
                        .payload
                        .deserialize()
                        .map_err(|e| HandlerError::failed(e.to_string()))?;
                    tokio::time::sleep(Duration::from_millis(delay.ms)).await;
                    Payload::from_serializable(&Slept { slept: delay.ms })
                        .map_err(|e| HandlerError::failed(e.to_string()))
                }
            }),
        )
        .unwrap()
        .register(
            "Hang",
            handler_fn(move |_, _| {
                hang_calls.fetch_add(1, Ordering::SeqCst);
                async {
                    futures::future::pending::<()>().await;
                    Ok::<_, HandlerError>(Payload::empty())
                }
            }),
        )
        .unwrap()
        .register(
            "Reset",
            handler_fn(move |_, _| {
                reset_calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Payload::from_json_str(r#"{"status":"Accepted"}"#)
                        .map_err(|e| HandlerError::failed(e.to_string()))
                }
            }),
        )
        .unwrap()
        .build()
}

// =============================================================================
// TOPOLOGY
// =============================================================================

/// Three adapters linked in a line.
pub struct Topology {
    pub csms: Adapter,
    pub relay: Adapter,
    pub device: Adapter,
    /// Relay (left) to CSMS (right).
    pub uplink: ChannelLink,
    /// Device (left) to relay (right).
    pub downlink: ChannelLink,
    /// Handler invocations on the device.
    pub device_calls: Arc<AtomicUsize>,
    pub transport: ChannelTransport,
}

impl Topology {
    /// Unsigned topology with default configs.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Every node signs and verifies with the shared key.
    pub fn signed() -> Self {
        Self::builder()
            .csms(signed(config(CSMS)))
            .relay(signed(config(RELAY)))
            .device(signed(config(DEVICE)))
            .build()
    }

    pub fn builder() -> TopologyBuilder {
        TopologyBuilder::default()
    }

    /// A request from the CSMS addressed to the device.
    pub fn to_device(&self, id: &str, action: &str, payload: &str) -> Request {
        Request::new(action, Payload::from_json_str(payload).unwrap())
            .with_correlation_id(id)
            .with_destination(self.device.local().clone())
    }

    pub fn device_calls(&self) -> usize {
        self.device_calls.load(Ordering::SeqCst)
    }
}

impl Default for Topology {
    fn default() -> Self {
        Self::new()
    }
}

/// Customizes each node before the topology is linked.
pub struct TopologyBuilder {
    csms: AdapterConfig,
    relay: AdapterConfig,
    device: AdapterConfig,
    customize_relay: Box<dyn FnOnce(AdapterBuilder) -> AdapterBuilder>,
}

impl Default for TopologyBuilder {
    fn default() -> Self {
        Self {
            csms: config(CSMS),
            relay: config(RELAY),
            device: config(DEVICE),
            customize_relay: Box::new(|builder| builder),
        }
    }
}

impl TopologyBuilder {
    pub fn csms(mut self, config: AdapterConfig) -> Self {
        self.csms = config;
        self
    }

    pub fn relay(mut self, config: AdapterConfig) -> Self {
        self.relay = config;
        self
    }

    pub fn device(mut self, config: AdapterConfig) -> Self {
        self.device = config;
        self
    }

    /// Adjust the relay's builder, e.g. to add forwarding filters.
    pub fn with_relay<F>(mut self, customize: F) -> Self
    where
        F: FnOnce(AdapterBuilder) -> AdapterBuilder + 'static,
    {
        self.customize_relay = Box::new(customize);
        self
    }

    /// Build and link the adapters. Must run inside a tokio runtime.
    pub fn build(self) -> Topology {
        let device_calls = Arc::new(AtomicUsize::new(0));

        let csms = Adapter::builder(self.csms).build().unwrap();
        let relay = (self.customize_relay)(Adapter::builder(self.relay))
            .build()
            .unwrap();
        let device = Adapter::builder(self.device)
            .handlers(device_handlers(device_calls.clone()))
            .build()
            .unwrap();

        let transport = ChannelTransport::new();
        let uplink = transport.link(&relay, &csms);
        let downlink = transport.link(&device, &relay);

        csms.routes().add_route(device.local().clone(), uplink.right);
        device.routes().set_default_route(Some(downlink.left));

        Topology {
            csms,
            relay,
            device,
            uplink,
            downlink,
            device_calls,
            transport,
        }
    }
}

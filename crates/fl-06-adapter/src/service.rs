//! # Adapter Facade
//!
//! [`AdapterIn`] drives connections: frames in, parsed envelopes to the
//! dispatcher. [`AdapterOut`] turns typed messages into awaited calls.
//! [`Adapter`] bundles both with the shared state; [`AdapterBuilder`]
//! composes it from an [`AdapterConfig`].

use crate::adapters::registry::ConnectionRegistry;
use crate::domain::config::{AdapterConfig, TimeoutConfig, WebSocketConfig};
use crate::domain::errors::AdapterError;
use fl_01_envelope::{parse, Frame, Message, Request, Response};
use fl_02_signature_policy::SignaturePolicy;
use fl_03_pending_requests::PendingRequestTable;
use fl_04_forwarding::{ForwardingEngine, ForwardingFilter};
use fl_05_dispatch::{Dispatcher, HandlerRegistry, ResponseErrorReport, RoutingTable};
use futures::{Stream, StreamExt};
use shared_bus::{AdapterEvent, EventPublisher, InMemoryEventBus, ObserverError};
use shared_types::{ConnectionId, NodeId, RequestFailure};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

// =============================================================================
// IN
// =============================================================================

/// Inbound side: connection lifecycle and read loops.
#[derive(Clone)]
pub struct AdapterIn {
    dispatcher: Dispatcher,
    connections: Arc<ConnectionRegistry>,
    events: Arc<InMemoryEventBus>,
}

impl AdapterIn {
    /// Register a new connection. Frames for it arrive on the receiver.
    pub fn open_connection(&self) -> (ConnectionId, mpsc::Receiver<Frame>) {
        let (connection, outbound) = self.connections.open();
        self.events
            .publish(AdapterEvent::ConnectionOpened { connection });
        (connection, outbound)
    }

    /// Parse one inbound frame and route it.
    pub fn handle_frame(&self, connection: ConnectionId, frame: Frame) {
        match parse(&frame) {
            Ok(envelope) => {
                debug!(
                    connection = %connection,
                    correlation_id = %envelope.correlation_id(),
                    kind = ?envelope.kind(),
                    "Frame received"
                );
                self.dispatcher.route(envelope, connection);
            }
            Err(error) => self.dispatcher.reject_malformed(&error, connection),
        }
    }

    /// Read loop: route every frame until the stream ends, then close the
    /// connection.
    pub async fn run<S>(&self, connection: ConnectionId, inbound: S)
    where
        S: Stream<Item = Frame> + Send,
    {
        futures::pin_mut!(inbound);
        while let Some(frame) = inbound.next().await {
            self.handle_frame(connection, frame);
        }
        self.close_connection(connection, "stream ended");
    }

    /// Tear down a connection: pending requests on it fail, its routes go.
    pub fn close_connection(&self, connection: ConnectionId, reason: &str) {
        if !self.connections.close(connection) {
            return;
        }
        let failed = self.dispatcher.on_connection_closed(connection, reason);
        info!(connection = %connection, failed, reason, "Connection closed");
        self.events.publish(AdapterEvent::ConnectionClosed {
            connection,
            reason: reason.to_string(),
        });
    }
}

// =============================================================================
// OUT
// =============================================================================

/// Outbound side: awaitable calls with per-action timeouts.
#[derive(Clone)]
pub struct AdapterOut {
    dispatcher: Dispatcher,
    timeouts: Arc<TimeoutConfig>,
}

impl AdapterOut {
    /// Send `message` to `destination` (or over the default route) and
    /// decode the typed response.
    pub async fn send<M: Message>(
        &self,
        destination: Option<NodeId>,
        message: &M,
    ) -> Result<M::Response, AdapterError> {
        let mut request = message.to_request()?;
        if let Some(destination) = destination {
            request = request.with_destination(destination);
        }
        let response = self.call(request).await?;
        Ok(response.payload.deserialize()?)
    }

    /// Send `message` on `connection` and decode the typed response.
    pub async fn send_on<M: Message>(
        &self,
        connection: ConnectionId,
        message: &M,
    ) -> Result<M::Response, AdapterError> {
        let request = message.to_request()?;
        let timeout = self.timeouts.for_action(M::ACTION);
        let response = self.dispatcher.call_on(connection, request, timeout).await?;
        Ok(response.payload.deserialize()?)
    }

    /// Call with the configured timeout for the request's action.
    ///
    /// Dropping the future cancels the request; a late answer is discarded.
    pub async fn call(&self, request: Request) -> Result<Response, RequestFailure> {
        let timeout = self.timeouts.for_action(&request.action);
        self.dispatcher.call(request, timeout).await
    }

    /// Like [`call`](Self::call), but gives up once `cancel` completes.
    pub async fn call_with_cancel<F>(
        &self,
        request: Request,
        cancel: F,
    ) -> Result<Response, RequestFailure>
    where
        F: Future<Output = ()>,
    {
        let timeout = self.timeouts.for_action(&request.action);
        self.dispatcher.call_with_cancel(request, timeout, cancel).await
    }

    pub async fn call_with_timeout(
        &self,
        request: Request,
        timeout: Duration,
    ) -> Result<Response, RequestFailure> {
        self.dispatcher.call(request, timeout).await
    }
}

// =============================================================================
// FACADE
// =============================================================================

/// One protocol node: IN, OUT and the state they share. Cheap to clone.
#[derive(Clone)]
pub struct Adapter {
    local: NodeId,
    input: AdapterIn,
    output: AdapterOut,
    forwarding: Arc<ForwardingEngine>,
    policy: Arc<SignaturePolicy>,
    websocket: WebSocketConfig,
}

impl Adapter {
    #[must_use]
    pub fn builder(config: AdapterConfig) -> AdapterBuilder {
        AdapterBuilder::new(config)
    }

    #[must_use]
    pub fn local(&self) -> &NodeId {
        &self.local
    }

    #[must_use]
    pub fn input(&self) -> &AdapterIn {
        &self.input
    }

    #[must_use]
    pub fn output(&self) -> &AdapterOut {
        &self.output
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.input.dispatcher
    }

    #[must_use]
    pub fn routes(&self) -> &Arc<RoutingTable> {
        self.dispatcher().routes()
    }

    #[must_use]
    pub fn pending(&self) -> &PendingRequestTable {
        self.dispatcher().pending()
    }

    #[must_use]
    pub fn connections(&self) -> &Arc<ConnectionRegistry> {
        &self.input.connections
    }

    #[must_use]
    pub fn events(&self) -> &Arc<InMemoryEventBus> {
        &self.input.events
    }

    /// The forwarding engine, for registering filters and observers.
    #[must_use]
    pub fn forwarding(&self) -> &Arc<ForwardingEngine> {
        &self.forwarding
    }

    /// The signature policy, for key rotation and rule changes.
    #[must_use]
    pub fn policy(&self) -> &Arc<SignaturePolicy> {
        &self.policy
    }

    #[must_use]
    pub fn websocket_config(&self) -> &WebSocketConfig {
        &self.websocket
    }

    pub fn on_response_error<F>(&self, name: impl Into<String>, callback: F)
    where
        F: Fn(&ResponseErrorReport) -> Result<(), ObserverError> + Send + Sync + 'static,
    {
        self.dispatcher().on_response_error(name, callback);
    }
}

impl std::fmt::Debug for Adapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Adapter")
            .field("local", &self.local)
            .field("connections", &self.connections().len())
            .field("pending", &self.pending().pending_count())
            .finish()
    }
}

/// Composes an [`Adapter`] from configuration plus code-level registrations.
pub struct AdapterBuilder {
    config: AdapterConfig,
    handlers: HandlerRegistry,
    filters: Vec<Arc<dyn ForwardingFilter>>,
    policy: Option<Arc<SignaturePolicy>>,
    events: Option<Arc<InMemoryEventBus>>,
}

impl AdapterBuilder {
    #[must_use]
    pub fn new(config: AdapterConfig) -> Self {
        Self {
            config,
            handlers: HandlerRegistry::default(),
            filters: Vec::new(),
            policy: None,
            events: None,
        }
    }

    #[must_use]
    pub fn handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = handlers;
        self
    }

    /// Add a forwarding filter after the configured built-in ones.
    #[must_use]
    pub fn filter(mut self, filter: Arc<dyn ForwardingFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// Use `policy` instead of building one from `config.signatures`.
    #[must_use]
    pub fn policy(mut self, policy: Arc<SignaturePolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    #[must_use]
    pub fn events(mut self, events: Arc<InMemoryEventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn build(self) -> Result<Adapter, AdapterError> {
        let config = self.config;
        config.validate()?;
        let local = config.node_id()?;

        let policy = match self.policy {
            Some(policy) => policy,
            None => Arc::new(SignaturePolicy::from_config(&config.signatures)?),
        };
        let events = self
            .events
            .unwrap_or_else(|| Arc::new(InMemoryEventBus::new()));
        let publisher: Arc<dyn EventPublisher> = events.clone();

        let forwarding = Arc::new(
            ForwardingEngine::from_config(local.clone(), &config.forwarding, policy.clone())
                .with_events(Arc::clone(&publisher)),
        );
        for filter in self.filters {
            forwarding.add_filter(filter);
        }

        let connections = Arc::new(ConnectionRegistry::new(config.websocket.outbound_buffer));
        let dispatcher = Dispatcher::builder(local.clone(), connections.clone())
            .policy(policy.clone())
            .handlers(self.handlers)
            .forwarding(forwarding.clone())
            .pending(PendingRequestTable::with_publisher(Arc::clone(&publisher)))
            .routes(Arc::new(RoutingTable::new()))
            .events(publisher)
            .relay_timeout(config.timeouts.relay())
            .build();

        info!(
            node = %local,
            actions = ?dispatcher.handlers().actions(),
            filters = forwarding.filter_count(),
            "Adapter assembled"
        );

        Ok(Adapter {
            local,
            input: AdapterIn {
                dispatcher: dispatcher.clone(),
                connections,
                events,
            },
            output: AdapterOut {
                dispatcher,
                timeouts: Arc::new(config.timeouts),
            },
            forwarding,
            policy,
            websocket: config.websocket,
        })
    }
}

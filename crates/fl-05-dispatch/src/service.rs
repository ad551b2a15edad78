//! # Dispatcher
//!
//! Routes every parsed inbound envelope:
//!
//! | Envelope | Addressed to us | Otherwise |
//! |----------|-----------------|-----------|
//! | Request | verify, run handler, sign reply | forwarding engine, relay |
//! | Response / RequestError | verify, settle pending entry | (settles the relay's entry) |
//! | ResponseError | report to observers | relay toward its destination |
//!
//! Outbound calls are signed and registered in the pending table before the
//! frame is handed to the transport.
//!
//! Nothing in here returns an error to the read loop: every failure becomes
//! an error frame to the peer or a typed failure for the waiting caller.

use crate::domain::errors::{DispatchError, TransportError};
use crate::domain::routing::RoutingTable;
use crate::handlers::HandlerRegistry;
use crate::ports::outbound::{HandlerContext, Transport};
use fl_01_envelope::{
    encode, Envelope, ErrorFrame, MalformedFrame, MessageKind, Request, Response,
};
use fl_02_signature_policy::{Direction, SignResult, SignaturePolicy, SignaturePolicyApi};
use fl_03_pending_requests::{Origin, PendingRequestTable, Reply, Waiter};
use fl_04_forwarding::{
    DefaultPolicy, Disposition, ForwardingApi, ForwardingEngine, SendReceipt,
};
use futures::FutureExt;
use shared_bus::{
    panic_message, AdapterEvent, EventPublisher, NullPublisher, ObserverError, ObserverList,
};
use shared_types::{
    ConnectionId, CorrelationId, ErrorCode, NetworkPath, NodeId, RequestFailure, SourceRouting,
};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Default time a relay waits for the answer to a forwarded request.
pub const DEFAULT_RELAY_TIMEOUT: Duration = Duration::from_secs(30);

/// A peer's complaint about a response this node sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseErrorReport {
    pub connection: ConnectionId,
    pub error: ErrorFrame,
}

struct DispatcherInner {
    local: NodeId,
    policy: Arc<dyn SignaturePolicyApi>,
    handlers: HandlerRegistry,
    forwarding: Arc<dyn ForwardingApi>,
    pending: PendingRequestTable,
    routes: Arc<RoutingTable>,
    transport: Arc<dyn Transport>,
    events: Arc<dyn EventPublisher>,
    response_errors: ObserverList<ResponseErrorReport>,
    relay_timeout: Duration,
}

/// Inbound router and outbound caller for one node. Cheap to clone.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

impl Dispatcher {
    #[must_use]
    pub fn builder(local: NodeId, transport: Arc<dyn Transport>) -> DispatcherBuilder {
        DispatcherBuilder::new(local, transport)
    }

    #[must_use]
    pub fn local(&self) -> &NodeId {
        &self.inner.local
    }

    #[must_use]
    pub fn pending(&self) -> &PendingRequestTable {
        &self.inner.pending
    }

    #[must_use]
    pub fn routes(&self) -> &Arc<RoutingTable> {
        &self.inner.routes
    }

    #[must_use]
    pub fn handlers(&self) -> &HandlerRegistry {
        &self.inner.handlers
    }

    /// Observe `ResponseError` frames addressed to this node.
    pub fn on_response_error<F>(&self, name: impl Into<String>, callback: F)
    where
        F: Fn(&ResponseErrorReport) -> Result<(), ObserverError> + Send + Sync + 'static,
    {
        self.inner.response_errors.add(name, callback);
    }

    // =========================================================================
    // INBOUND
    // =========================================================================

    /// Route one envelope received on `connection`.
    ///
    /// Handlers and relays run on spawned tasks, so this returns without
    /// waiting for them. Must be called from within a tokio runtime.
    pub fn route(&self, envelope: Envelope, connection: ConnectionId) {
        match envelope {
            Envelope::Request(request) => {
                if request.is_addressed_to(&self.inner.local) {
                    self.handle_local(request, connection);
                } else {
                    self.forward(request, connection);
                }
            }
            Envelope::Response(_) | Envelope::RequestError(_) => {
                self.complete(envelope, connection);
            }
            Envelope::ResponseError(error) => self.response_error(error, connection),
        }
    }

    /// Answer a frame that failed to parse.
    pub fn reject_malformed(&self, error: &MalformedFrame, connection: ConnectionId) {
        let inner = &self.inner;
        warn!(
            connection = %connection,
            correlation_id = ?error.correlation_id,
            reason = %error.reason,
            "Rejecting malformed frame"
        );
        inner.events.publish(AdapterEvent::FrameRejected {
            connection,
            correlation_id: error.correlation_id.clone(),
            reason: error.reason.to_string(),
        });

        // A garbled answer still settles the request it answers.
        if let (Some(id), Some(MessageKind::Response | MessageKind::RequestError)) =
            (&error.correlation_id, error.kind)
        {
            if let Some(key) = inner.pending.find(id, connection, None) {
                inner
                    .pending
                    .fail(key, RequestFailure::MalformedFrame(error.reason.to_string()));
            }
        }

        if let Some(reply) = error.reply() {
            let reply = self.sign_outgoing(reply, "");
            self.deliver(connection, &reply);
        }
    }

    fn handle_local(&self, request: Request, connection: ConnectionId) {
        let inner = &self.inner;
        let action = request.action.clone();
        let mut envelope = Envelope::Request(request);
        let verified = inner
            .policy
            .evaluate(&mut envelope, &action, Direction::Incoming);
        let Envelope::Request(request) = envelope else {
            return;
        };

        if let SignResult::Fail(reason) = verified {
            inner.events.publish(AdapterEvent::SignatureRejected {
                correlation_id: request.correlation_id.clone(),
                action: action.clone(),
                reason: reason.clone(),
            });
            let reply = request.error_reply(&inner.local, ErrorCode::SecurityError, reason);
            self.answer(connection, Envelope::RequestError(reply), &action);
            return;
        }

        let Some(handler) = inner.handlers.get(&action) else {
            warn!(
                correlation_id = %request.correlation_id,
                action = %action,
                "No handler registered for action"
            );
            let reply = request.error_reply(
                &inner.local,
                ErrorCode::NotImplemented,
                format!("action {action} is not supported"),
            );
            self.answer(connection, Envelope::RequestError(reply), &action);
            return;
        };

        let correlation_id = request.correlation_id.clone();
        let reply_path = request.header.path.response_path(&inner.local);
        let context = HandlerContext {
            local: inner.local.clone(),
            connection,
            origin: request.header.path.origin().cloned(),
        };
        debug!(correlation_id = %correlation_id, action = %action, "Dispatching to handler");

        let dispatcher = self.clone();
        tokio::spawn(async move {
            let outcome = AssertUnwindSafe(handler.handle(request, context))
                .catch_unwind()
                .await;

            let reply = match outcome {
                Ok(Ok(payload)) => {
                    let mut response = Response::new(correlation_id, payload);
                    response.header.path = reply_path;
                    Envelope::Response(response)
                }
                Ok(Err(failure)) => {
                    warn!(
                        correlation_id = %correlation_id,
                        action = %action,
                        error = %failure,
                        "Handler failed"
                    );
                    let (code, description) = failure.to_wire();
                    let mut error = ErrorFrame::new(correlation_id, code, description);
                    error.header.path = reply_path;
                    Envelope::RequestError(error)
                }
                Err(panic) => {
                    error!(
                        correlation_id = %correlation_id,
                        action = %action,
                        panic = %panic_message(panic.as_ref()),
                        "Handler panicked"
                    );
                    let mut error = ErrorFrame::new(
                        correlation_id,
                        ErrorCode::InternalError,
                        "handler failed unexpectedly",
                    );
                    error.header.path = reply_path;
                    Envelope::RequestError(error)
                }
            };

            dispatcher.answer(connection, reply, &action);
        });
    }

    fn forward(&self, request: Request, connection: ConnectionId) {
        match self.inner.forwarding.decide(request, connection).into_disposition() {
            Disposition::Respond { response } => self.deliver(connection, &response),
            Disposition::Transmit { request, receipt } => self.relay(request, receipt, connection),
        }
    }

    fn relay(&self, mut request: Request, receipt: SendReceipt, from: ConnectionId) {
        let inner = &self.inner;
        let correlation_id = request.correlation_id.clone();
        let action = request.action.clone();
        let reply_path = request.header.path.response_path(&inner.local);

        let Some(route) = inner.routes.resolve(&request, &inner.local) else {
            let reason = match request.destination() {
                Some(destination) => DispatchError::NoRoute(destination.clone()),
                None => DispatchError::NoDestination,
            }
            .to_string();
            warn!(correlation_id = %correlation_id, action = %action, reason = %reason, "Cannot relay request");
            receipt.failed(None, reason.clone());
            self.relay_error(from, correlation_id, &action, reply_path, ErrorCode::GenericError, reason);
            return;
        };

        let waiter = match inner.pending.register_forwarded(
            correlation_id.clone(),
            &action,
            route.connection,
            from,
            inner.relay_timeout,
        ) {
            Ok(waiter) => waiter,
            Err(e) => {
                receipt.failed(Some(route.next_hop), e.to_string());
                self.relay_error(from, correlation_id, &action, reply_path, ErrorCode::GenericError, e.to_string());
                return;
            }
        };
        let key = waiter.key().clone();
        self.spawn_relay(waiter, from, action, reply_path);

        request.header.path.push(inner.local.clone());
        match self.send(route.connection, &Envelope::Request(request)) {
            Ok(()) => receipt.delivered(route.next_hop),
            Err(e) => {
                error!(
                    correlation_id = %correlation_id,
                    connection = %route.connection,
                    error = %e,
                    "Failed to relay request"
                );
                receipt.failed(Some(route.next_hop), e.to_string());
                inner.pending.fail(
                    key,
                    RequestFailure::TransmissionFailed {
                        reason: e.to_string(),
                    },
                );
            }
        }
    }

    /// Wait for the relayed request's answer and pass it back to `from`.
    fn spawn_relay(&self, waiter: Waiter, from: ConnectionId, action: String, reply_path: NetworkPath) {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            let correlation_id = waiter.correlation_id().clone();
            match waiter.wait().await {
                Ok(reply) => dispatcher.deliver(from, &Envelope::from(reply)),
                Err(failure) => {
                    warn!(
                        correlation_id = %correlation_id,
                        action = %action,
                        error = %failure,
                        "Relayed request failed"
                    );
                    dispatcher.relay_error(
                        from,
                        correlation_id,
                        &action,
                        reply_path,
                        failure.kind().wire_code(),
                        failure.to_string(),
                    );
                }
            }
        });
    }

    fn relay_error(
        &self,
        to: ConnectionId,
        correlation_id: CorrelationId,
        action: &str,
        reply_path: NetworkPath,
        code: ErrorCode,
        description: String,
    ) {
        let mut error = ErrorFrame::new(correlation_id, code, description);
        error.header.path = reply_path;
        let reply = self.inner.policy.sign_reply(Envelope::RequestError(error), action);
        self.deliver(to, &reply);
    }

    /// Settle the pending entry a `Response` or `RequestError` answers.
    fn complete(&self, mut envelope: Envelope, connection: ConnectionId) {
        let inner = &self.inner;
        let correlation_id = envelope.correlation_id().clone();
        let toward = self.toward_originator(&envelope.header().path);
        let Some(key) = inner.pending.find(&correlation_id, connection, toward) else {
            inner.pending.discard(&correlation_id, Some(connection));
            return;
        };

        // Relays pass answers through unverified; the originator checks them.
        if let Some(info) = inner
            .pending
            .peek(key.clone())
            .filter(|info| info.origin == Origin::Local)
        {
            let verified = inner
                .policy
                .evaluate(&mut envelope, &info.action, Direction::Incoming);
            if let SignResult::Fail(reason) = verified {
                inner.events.publish(AdapterEvent::SignatureRejected {
                    correlation_id: correlation_id.clone(),
                    action: info.action.clone(),
                    reason: reason.clone(),
                });
                inner.pending.fail(
                    key,
                    RequestFailure::SignatureError {
                        reason: reason.clone(),
                    },
                );
                if let Envelope::Response(response) = &envelope {
                    self.complain(connection, response, &info.action, reason);
                }
                return;
            }
        }

        let reply = match envelope {
            Envelope::Response(response) => Reply::Response(response),
            Envelope::RequestError(error) => Reply::RequestError(error),
            Envelope::Request(_) | Envelope::ResponseError(_) => return,
        };
        inner.pending.resolve_from(key, connection, reply);
    }

    /// Connection leading back toward whoever sent the request a reply
    /// answers, when the reply's path continues past this node.
    fn toward_originator(&self, path: &NetworkPath) -> Option<ConnectionId> {
        let local = &self.inner.local;
        if !path.contains(local) {
            return None;
        }
        let originator_side = path.next_hop_after(local)?;
        self.inner.routes.lookup(originator_side)
    }

    /// Tell the responder its response was not accepted.
    fn complain(&self, connection: ConnectionId, response: &Response, action: &str, reason: String) {
        let inner = &self.inner;
        let mut error = ErrorFrame::new(
            response.correlation_id.clone(),
            ErrorCode::SecurityError,
            reason,
        );
        error.header.path = NetworkPath::from_hops(vec![inner.local.clone()]);
        error.header.routing = response
            .header
            .path
            .origin()
            .filter(|responder| *responder != &inner.local)
            .cloned()
            .map(SourceRouting::Destination);

        let error = self.sign_outgoing(Envelope::ResponseError(error), action);
        self.deliver(connection, &error);
    }

    fn response_error(&self, mut error: ErrorFrame, connection: ConnectionId) {
        let inner = &self.inner;

        if let Some(routing) = error
            .header
            .routing
            .clone()
            .filter(|routing| !routing.is_addressed_to(&inner.local))
        {
            match inner.routes.resolve_routing(&routing, &inner.local) {
                Some(route) => {
                    error.header.path.push(inner.local.clone());
                    self.deliver(route.connection, &Envelope::ResponseError(error));
                }
                None => warn!(
                    correlation_id = %error.correlation_id,
                    "No route for response error, dropping it"
                ),
            }
            return;
        }

        warn!(
            correlation_id = %error.correlation_id,
            connection = %connection,
            code = %error.code,
            description = %error.description,
            "Peer rejected a response"
        );
        inner.events.publish(AdapterEvent::RemoteErrorReported {
            correlation_id: error.correlation_id.clone(),
            code: error.code.clone(),
            description: error.description.clone(),
        });
        inner
            .response_errors
            .notify(&ResponseErrorReport { connection, error });
    }

    // =========================================================================
    // OUTBOUND
    // =========================================================================

    /// Send `request` toward its destination and wait for the answer.
    ///
    /// Requests without routing go out on the default route. Dropping the
    /// returned future cancels the call: the pending entry is removed and
    /// a late answer is discarded.
    pub async fn call(&self, request: Request, timeout: Duration) -> Result<Response, RequestFailure> {
        let connection = self.route_for(&request)?;
        self.call_on(connection, request, timeout).await
    }

    /// Like [`call`](Self::call), but gives up as soon as `cancel`
    /// completes, failing with [`RequestFailure::Cancelled`].
    pub async fn call_with_cancel<F>(
        &self,
        request: Request,
        timeout: Duration,
        cancel: F,
    ) -> Result<Response, RequestFailure>
    where
        F: Future<Output = ()>,
    {
        let connection = self.route_for(&request)?;
        let waiter = self.transmit(connection, request, timeout)?;
        waiter.wait_or_cancel(cancel).await?.into_result()
    }

    /// Send `request` on `connection` and wait for the answer.
    ///
    /// Cancelled by dropping, as [`call`](Self::call).
    pub async fn call_on(
        &self,
        connection: ConnectionId,
        request: Request,
        timeout: Duration,
    ) -> Result<Response, RequestFailure> {
        let waiter = self.transmit(connection, request, timeout)?;
        waiter.wait().await?.into_result()
    }

    fn route_for(&self, request: &Request) -> Result<ConnectionId, RequestFailure> {
        let inner = &self.inner;
        let connection = match inner.routes.resolve(request, &inner.local) {
            Some(route) => Some(route.connection),
            None if request.header.routing.is_none() => inner.routes.default_route(),
            None => None,
        };
        connection.ok_or_else(|| {
            let reason = match request.destination() {
                Some(destination) => DispatchError::NoRoute(destination.clone()),
                None => DispatchError::NoDestination,
            };
            RequestFailure::TransmissionFailed {
                reason: reason.to_string(),
            }
        })
    }

    /// Sign, register and send `request`. The waiter settles with the
    /// answer, or with the failure if the send does not go through.
    fn transmit(
        &self,
        connection: ConnectionId,
        mut request: Request,
        timeout: Duration,
    ) -> Result<Waiter, RequestFailure> {
        let inner = &self.inner;
        if request.header.path.last() != Some(&inner.local) {
            request.header.path.push(inner.local.clone());
        }

        let correlation_id = request.correlation_id.clone();
        let action = request.action.clone();
        let mut envelope = Envelope::Request(request);
        if let SignResult::Fail(reason) =
            inner.policy.evaluate(&mut envelope, &action, Direction::Outgoing)
        {
            return Err(RequestFailure::SignatureError { reason });
        }

        let waiter = inner
            .pending
            .register(correlation_id.clone(), &action, connection, timeout)
            .map_err(|e| RequestFailure::TransmissionFailed {
                reason: e.to_string(),
            })?;

        if let Err(e) = self.send(connection, &envelope) {
            error!(
                correlation_id = %correlation_id,
                connection = %connection,
                error = %e,
                "Failed to send request"
            );
            inner.pending.fail(
                waiter.key().clone(),
                RequestFailure::TransmissionFailed {
                    reason: e.to_string(),
                },
            );
        }

        Ok(waiter)
    }

    /// Encode `envelope` and hand it to the transport.
    pub fn send(&self, connection: ConnectionId, envelope: &Envelope) -> Result<(), TransportError> {
        let frame = encode(envelope)?;
        self.inner.transport.send_frame(connection, frame)
    }

    /// Fail everything in flight on `connection` and forget its routes.
    ///
    /// Returns the number of pending requests failed.
    pub fn on_connection_closed(&self, connection: ConnectionId, reason: &str) -> usize {
        let failed = self.inner.pending.fail_connection(
            connection,
            RequestFailure::TransmissionFailed {
                reason: format!("connection closed: {reason}"),
            },
        );
        let routes = self.inner.routes.remove_connection(connection);
        debug!(connection = %connection, failed, routes, reason, "Connection detached from dispatcher");
        failed
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    /// Sign a locally produced answer and send it.
    fn answer(&self, connection: ConnectionId, reply: Envelope, action: &str) {
        let reply = self.inner.policy.sign_reply(reply, action);
        let error_code = match &reply {
            Envelope::RequestError(error) => Some(error.code.clone()),
            _ => None,
        };
        self.inner.events.publish(AdapterEvent::RequestHandled {
            correlation_id: reply.correlation_id().clone(),
            action: action.to_string(),
            error_code,
        });
        self.deliver(connection, &reply);
    }

    /// Sign `envelope` if the policy asks for it. Sent unsigned otherwise.
    fn sign_outgoing(&self, mut envelope: Envelope, action: &str) -> Envelope {
        if let SignResult::Fail(reason) =
            self.inner
                .policy
                .evaluate(&mut envelope, action, Direction::Outgoing)
        {
            warn!(
                correlation_id = %envelope.correlation_id(),
                reason = %reason,
                "Sending error frame unsigned"
            );
        }
        envelope
    }

    fn deliver(&self, connection: ConnectionId, envelope: &Envelope) {
        if let Err(e) = self.send(connection, envelope) {
            error!(
                correlation_id = %envelope.correlation_id(),
                connection = %connection,
                error = %e,
                "Failed to send frame"
            );
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("local", &self.inner.local)
            .field("handlers", &self.inner.handlers)
            .field("pending", &self.inner.pending)
            .finish()
    }
}

/// Assembles a [`Dispatcher`]. Unset parts get permissive defaults.
pub struct DispatcherBuilder {
    local: NodeId,
    transport: Arc<dyn Transport>,
    policy: Option<Arc<dyn SignaturePolicyApi>>,
    handlers: HandlerRegistry,
    forwarding: Option<Arc<dyn ForwardingApi>>,
    pending: Option<PendingRequestTable>,
    routes: Option<Arc<RoutingTable>>,
    events: Arc<dyn EventPublisher>,
    relay_timeout: Duration,
}

impl DispatcherBuilder {
    #[must_use]
    pub fn new(local: NodeId, transport: Arc<dyn Transport>) -> Self {
        Self {
            local,
            transport,
            policy: None,
            handlers: HandlerRegistry::default(),
            forwarding: None,
            pending: None,
            routes: None,
            events: Arc::new(NullPublisher),
            relay_timeout: DEFAULT_RELAY_TIMEOUT,
        }
    }

    #[must_use]
    pub fn policy(mut self, policy: Arc<dyn SignaturePolicyApi>) -> Self {
        self.policy = Some(policy);
        self
    }

    #[must_use]
    pub fn handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = handlers;
        self
    }

    #[must_use]
    pub fn forwarding(mut self, forwarding: Arc<dyn ForwardingApi>) -> Self {
        self.forwarding = Some(forwarding);
        self
    }

    #[must_use]
    pub fn pending(mut self, pending: PendingRequestTable) -> Self {
        self.pending = Some(pending);
        self
    }

    #[must_use]
    pub fn routes(mut self, routes: Arc<RoutingTable>) -> Self {
        self.routes = Some(routes);
        self
    }

    #[must_use]
    pub fn events(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = events;
        self
    }

    #[must_use]
    pub fn relay_timeout(mut self, timeout: Duration) -> Self {
        self.relay_timeout = timeout;
        self
    }

    #[must_use]
    pub fn build(self) -> Dispatcher {
        let policy = self
            .policy
            .unwrap_or_else(|| Arc::new(SignaturePolicy::permissive()));
        let forwarding = self.forwarding.unwrap_or_else(|| {
            Arc::new(
                ForwardingEngine::new(self.local.clone(), DefaultPolicy::Forward, Arc::clone(&policy))
                    .with_events(Arc::clone(&self.events)),
            )
        });
        let pending = self
            .pending
            .unwrap_or_else(|| PendingRequestTable::with_publisher(Arc::clone(&self.events)));

        Dispatcher {
            inner: Arc::new(DispatcherInner {
                local: self.local,
                policy,
                handlers: self.handlers,
                forwarding,
                pending,
                routes: self.routes.unwrap_or_default(),
                transport: self.transport,
                events: self.events,
                response_errors: ObserverList::new("dispatch.response_error"),
                relay_timeout: self.relay_timeout,
            }),
        }
    }
}

//! # Pending-Request Table
//!
//! Maps in-flight requests to whoever awaits their answer.
//!
//! Flow:
//! 1. The sender calls `register()` and gets a [`Waiter`]
//! 2. The request is transmitted
//! 3. Exactly one of these removes the entry and settles the waiter:
//!    `resolve()` (answer arrived), `fail()` (transport failure),
//!    `cancel()` / dropping the waiter, or the entry's timeout task
//!
//! Every terminal path removes the entry atomically before delivering, so
//! whichever path removes first is the only one that delivers. A timeout
//! task only removes the registration it was scheduled for, identified by
//! ticket, so an id can be reused as soon as its previous request settles.
//!
//! Entries are keyed by [`PendingKey`]: the correlation id plus the
//! initiator. Local callers share one id space; every peer a relay
//! forwards for has its own.

use crate::domain::entry::{Origin, PendingInfo, PendingKey, PendingOutcome, PendingRequest, Reply};
use crate::domain::errors::PendingError;
use crate::domain::stats::PendingStats;
use crate::waiter::Waiter;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use shared_bus::{AdapterEvent, EventPublisher, NullPublisher};
use shared_types::{ConnectionId, CorrelationId, ErrorKind, RequestFailure};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

pub(crate) struct TableInner {
    pending: DashMap<PendingKey, PendingRequest>,
    next_ticket: AtomicU64,
    stats: PendingStats,
    events: Arc<dyn EventPublisher>,
}

/// Process-wide table of in-flight requests, shared by all connections.
///
/// Cloning is cheap; clones share the same table.
#[derive(Clone)]
pub struct PendingRequestTable {
    inner: Arc<TableInner>,
}

impl PendingRequestTable {
    /// Table that publishes nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::with_publisher(Arc::new(NullPublisher))
    }

    /// Table that reports every transition to `events`.
    #[must_use]
    pub fn with_publisher(events: Arc<dyn EventPublisher>) -> Self {
        Self {
            inner: Arc::new(TableInner {
                pending: DashMap::new(),
                next_ticket: AtomicU64::new(1),
                stats: PendingStats::default(),
                events,
            }),
        }
    }

    /// Register a request sent on `connection` by a local caller.
    ///
    /// Must be called from within a tokio runtime, which runs the timeout.
    pub fn register(
        &self,
        correlation_id: CorrelationId,
        action: &str,
        connection: ConnectionId,
        timeout: Duration,
    ) -> Result<Waiter, PendingError> {
        self.insert(PendingKey::local(correlation_id), action, connection, timeout)
    }

    /// Register a request relayed on behalf of the peer on `from`.
    ///
    /// Ids only collide with other requests relayed for the same peer.
    pub fn register_forwarded(
        &self,
        correlation_id: CorrelationId,
        action: &str,
        connection: ConnectionId,
        from: ConnectionId,
        timeout: Duration,
    ) -> Result<Waiter, PendingError> {
        self.insert(
            PendingKey::forwarded(from, correlation_id),
            action,
            connection,
            timeout,
        )
    }

    fn insert(
        &self,
        key: PendingKey,
        action: &str,
        connection: ConnectionId,
        timeout: Duration,
    ) -> Result<Waiter, PendingError> {
        let runtime = Handle::try_current().map_err(|_| PendingError::NoRuntime)?;
        let ticket = self.inner.next_ticket.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = oneshot::channel();

        match self.inner.pending.entry(key.clone()) {
            Entry::Occupied(_) => {
                warn!(
                    correlation_id = %key.correlation_id,
                    origin = ?key.origin,
                    action,
                    "Refusing duplicate in-flight correlation id"
                );
                return Err(PendingError::DuplicateCorrelationId(key.correlation_id));
            }
            Entry::Vacant(slot) => {
                // Spawned while the shard is locked: the timer cannot observe
                // the map before the entry exists.
                let table = Arc::downgrade(&self.inner);
                let timer_key = key.clone();
                let timer = runtime.spawn(async move {
                    tokio::time::sleep(timeout).await;
                    if let Some(table) = table.upgrade() {
                        table.expire(&timer_key, ticket);
                    }
                });

                slot.insert(PendingRequest {
                    action: action.to_string(),
                    connection,
                    origin: key.origin,
                    sent_at: Instant::now(),
                    timeout,
                    ticket,
                    sender,
                    timer: Some(timer.abort_handle()),
                });
            }
        }

        self.inner.stats.total_registered.fetch_add(1, Ordering::Relaxed);
        debug!(
            correlation_id = %key.correlation_id,
            action,
            connection = %connection,
            timeout_ms = timeout.as_millis() as u64,
            origin = ?key.origin,
            "Registered pending request"
        );
        self.inner.events.publish(AdapterEvent::RequestRegistered {
            correlation_id: key.correlation_id.clone(),
            action: action.to_string(),
            connection,
        });

        Ok(Waiter::new(key, ticket, receiver, Arc::downgrade(&self.inner)))
    }

    /// Key of the entry answered by a reply with `correlation_id` that
    /// arrived on `connection`.
    ///
    /// Only entries sent on `connection` qualify. `toward` is the
    /// connection leading back to the originator, when the reply's path
    /// names one; it picks between requests relayed for different peers.
    /// Otherwise a local entry wins, then the only relayed entry with the
    /// id. Several relayed candidates and no `toward` match nothing.
    #[must_use]
    pub fn find(
        &self,
        correlation_id: &CorrelationId,
        connection: ConnectionId,
        toward: Option<ConnectionId>,
    ) -> Option<PendingKey> {
        let sent_on = |key: &PendingKey| {
            self.inner
                .pending
                .get(key)
                .is_some_and(|entry| entry.connection == connection)
        };

        if let Some(from) = toward {
            let key = PendingKey::forwarded(from, correlation_id.clone());
            if sent_on(&key) {
                return Some(key);
            }
        }
        let key = PendingKey::local(correlation_id.clone());
        if sent_on(&key) {
            return Some(key);
        }

        let candidates: Vec<PendingKey> = self
            .inner
            .pending
            .iter()
            .filter(|e| &e.key().correlation_id == correlation_id && e.value().connection == connection)
            .map(|e| e.key().clone())
            .collect();
        match <[PendingKey; 1]>::try_from(candidates) {
            Ok([key]) => Some(key),
            Err(candidates) => {
                if !candidates.is_empty() {
                    warn!(
                        correlation_id = %correlation_id,
                        connection = %connection,
                        candidates = candidates.len(),
                        "Reply matches several relayed requests"
                    );
                }
                None
            }
        }
    }

    /// Settle the entry for `key` with the peer's answer.
    ///
    /// Returns false, and discards the reply, if no entry is pending.
    pub fn resolve(&self, key: impl Into<PendingKey>, reply: Reply) -> bool {
        let key = key.into();
        match self.inner.take_if(&key, |_| true) {
            Some(entry) => {
                self.inner.deliver(&key, entry, Ok(reply), true);
                true
            }
            None => {
                self.inner.discard(&key.correlation_id, None);
                false
            }
        }
    }

    /// Like [`resolve`](Self::resolve), but only accepts the reply if it
    /// arrived on the connection the request was sent on.
    pub fn resolve_from(
        &self,
        key: impl Into<PendingKey>,
        connection: ConnectionId,
        reply: Reply,
    ) -> bool {
        let key = key.into();
        match self
            .inner
            .take_if(&key, |entry| entry.connection == connection)
        {
            Some(entry) => {
                self.inner.deliver(&key, entry, Ok(reply), true);
                true
            }
            None => {
                self.inner.discard(&key.correlation_id, Some(connection));
                false
            }
        }
    }

    /// Count and report a reply that matches no pending entry.
    pub fn discard(&self, correlation_id: &CorrelationId, connection: Option<ConnectionId>) {
        self.inner.discard(correlation_id, connection);
    }

    /// Settle the entry with a typed failure.
    pub fn fail(&self, key: impl Into<PendingKey>, failure: RequestFailure) -> bool {
        let key = key.into();
        match self.inner.take_if(&key, |_| true) {
            Some(entry) => {
                self.inner.deliver(&key, entry, Err(failure), true);
                true
            }
            None => false,
        }
    }

    /// Abandon the entry; its waiter receives `Cancelled`.
    pub fn cancel(&self, key: impl Into<PendingKey>) -> bool {
        let key = key.into();
        match self.inner.take_if(&key, |_| true) {
            Some(entry) => {
                self.inner
                    .deliver(&key, entry, Err(RequestFailure::Cancelled), true);
                true
            }
            None => false,
        }
    }

    /// Fail every entry that was sent on `connection`.
    ///
    /// Returns the number of entries failed.
    pub fn fail_connection(&self, connection: ConnectionId, failure: RequestFailure) -> usize {
        let affected: Vec<(PendingKey, u64)> = self
            .inner
            .pending
            .iter()
            .filter(|e| e.value().connection == connection)
            .map(|e| (e.key().clone(), e.value().ticket))
            .collect();

        let mut failed = 0;
        for (key, ticket) in affected {
            if let Some(entry) = self.inner.take_if(&key, |e| e.ticket == ticket) {
                self.inner.deliver(&key, entry, Err(failure.clone()), true);
                failed += 1;
            }
        }

        if failed > 0 {
            warn!(
                connection = %connection,
                failed,
                error = %failure,
                "Failed pending requests of closed connection"
            );
        }
        failed
    }

    /// Snapshot of the entry for `key`, if pending.
    #[must_use]
    pub fn peek(&self, key: impl Into<PendingKey>) -> Option<PendingInfo> {
        let key = key.into();
        self.inner.pending.get(&key).map(|entry| entry.info(&key))
    }

    #[must_use]
    pub fn is_pending(&self, key: impl Into<PendingKey>) -> bool {
        self.inner.pending.contains_key(&key.into())
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    #[must_use]
    pub fn stats(&self) -> &PendingStats {
        &self.inner.stats
    }
}

impl Default for PendingRequestTable {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PendingRequestTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRequestTable")
            .field("pending", &self.pending_count())
            .finish()
    }
}

impl TableInner {
    fn take_if(
        &self,
        key: &PendingKey,
        accept: impl FnOnce(&PendingRequest) -> bool,
    ) -> Option<PendingRequest> {
        self.pending
            .remove_if(key, |_, entry| accept(entry))
            .map(|(_, entry)| entry)
    }

    /// Timer path. Only removes the registration the timer belongs to.
    fn expire(&self, key: &PendingKey, ticket: u64) {
        if let Some(entry) = self.take_if(key, |e| e.ticket == ticket) {
            warn!(
                correlation_id = %key.correlation_id,
                action = %entry.action,
                timeout_ms = entry.timeout.as_millis() as u64,
                "Pending request timed out"
            );
            let failure = RequestFailure::Timeout {
                after: entry.timeout,
            };
            self.deliver(key, entry, Err(failure), false);
        }
    }

    /// Waiter path: the caller stopped waiting.
    pub(crate) fn abandon(&self, key: &PendingKey, ticket: u64) {
        if let Some(entry) = self.take_if(key, |e| e.ticket == ticket) {
            self.deliver(key, entry, Err(RequestFailure::Cancelled), true);
        }
    }

    fn discard(&self, correlation_id: &CorrelationId, connection: Option<ConnectionId>) {
        self.stats.total_discarded.fetch_add(1, Ordering::Relaxed);
        warn!(
            correlation_id = %correlation_id,
            "Reply for unknown or expired correlation id discarded"
        );
        self.events.publish(AdapterEvent::ResponseDiscarded {
            correlation_id: correlation_id.clone(),
            connection,
        });
    }

    fn deliver(
        &self,
        key: &PendingKey,
        entry: PendingRequest,
        outcome: PendingOutcome,
        stop_timer: bool,
    ) {
        if stop_timer {
            if let Some(timer) = &entry.timer {
                timer.abort();
            }
        }

        let correlation_id = &key.correlation_id;
        let elapsed = entry.sent_at.elapsed();
        let event = match &outcome {
            Ok(Reply::Response(_)) => {
                self.stats.total_completed.fetch_add(1, Ordering::Relaxed);
                debug!(
                    correlation_id = %correlation_id,
                    action = %entry.action,
                    response_time_ms = elapsed.as_millis() as u64,
                    "Completed pending request"
                );
                AdapterEvent::RequestCompleted {
                    correlation_id: correlation_id.clone(),
                    action: entry.action.clone(),
                    elapsed_ms: elapsed.as_millis() as u64,
                }
            }
            Ok(Reply::RequestError(error)) => {
                self.stats.total_errored.fetch_add(1, Ordering::Relaxed);
                debug!(
                    correlation_id = %correlation_id,
                    action = %entry.action,
                    code = %error.code,
                    "Pending request answered with error"
                );
                AdapterEvent::RequestFailed {
                    correlation_id: correlation_id.clone(),
                    action: entry.action.clone(),
                    kind: ErrorKind::from_wire_code(&error.code),
                }
            }
            Err(failure) => {
                let counter = match failure.kind() {
                    ErrorKind::Timeout => &self.stats.total_timeouts,
                    ErrorKind::Cancelled => &self.stats.total_cancelled,
                    _ => &self.stats.total_errored,
                };
                counter.fetch_add(1, Ordering::Relaxed);
                debug!(
                    correlation_id = %correlation_id,
                    action = %entry.action,
                    error = %failure,
                    "Pending request failed"
                );
                AdapterEvent::RequestFailed {
                    correlation_id: correlation_id.clone(),
                    action: entry.action.clone(),
                    kind: failure.kind(),
                }
            }
        };

        if entry.sender.send(outcome).is_err() {
            debug!(correlation_id = %correlation_id, "Waiter already dropped");
        }
        self.events.publish(event);
    }
}

//! Caller-side handle for one pending request.

use crate::domain::entry::{PendingKey, PendingOutcome};
use crate::service::TableInner;
use shared_types::{CorrelationId, RequestFailure};
use std::future::Future;
use std::sync::Weak;
use tokio::sync::oneshot;

/// Resolves exactly once with the outcome of its request.
///
/// Dropping an unsettled waiter cancels the request and removes its entry.
#[derive(Debug)]
pub struct Waiter {
    key: PendingKey,
    ticket: u64,
    receiver: oneshot::Receiver<PendingOutcome>,
    table: Weak<TableInner>,
    settled: bool,
}

impl Waiter {
    pub(crate) fn new(
        key: PendingKey,
        ticket: u64,
        receiver: oneshot::Receiver<PendingOutcome>,
        table: Weak<TableInner>,
    ) -> Self {
        Self {
            key,
            ticket,
            receiver,
            table,
            settled: false,
        }
    }

    #[must_use]
    pub fn correlation_id(&self) -> &CorrelationId {
        &self.key.correlation_id
    }

    #[must_use]
    pub fn key(&self) -> &PendingKey {
        &self.key
    }

    /// Wait for the response, error frame, timeout or failure.
    pub async fn wait(mut self) -> PendingOutcome {
        let outcome = (&mut self.receiver)
            .await
            .unwrap_or(Err(RequestFailure::Cancelled));
        self.settled = true;
        outcome
    }

    /// Wait, but give up as soon as `cancel` completes.
    ///
    /// An outcome that is already available wins over cancellation.
    pub async fn wait_or_cancel<F>(mut self, cancel: F) -> PendingOutcome
    where
        F: Future<Output = ()>,
    {
        let outcome = tokio::select! {
            biased;
            outcome = &mut self.receiver => outcome.unwrap_or(Err(RequestFailure::Cancelled)),
            () = cancel => {
                self.abandon();
                // The entry may have settled between the poll and the abandon.
                match self.receiver.try_recv() {
                    Ok(outcome) => outcome,
                    Err(_) => Err(RequestFailure::Cancelled),
                }
            }
        };
        self.settled = true;
        outcome
    }

    fn abandon(&self) {
        if let Some(table) = self.table.upgrade() {
            table.abandon(&self.key, self.ticket);
        }
    }
}

impl Drop for Waiter {
    fn drop(&mut self) {
        if !self.settled {
            self.abandon();
        }
    }
}

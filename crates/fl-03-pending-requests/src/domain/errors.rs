//! Pending-table errors.

use shared_types::CorrelationId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PendingError {
    /// A request with this id is still in flight.
    #[error("correlation id {0} is already in flight")]
    DuplicateCorrelationId(CorrelationId),

    /// Timers need a tokio runtime; registration happened outside one.
    #[error("no tokio runtime available to schedule the request timeout")]
    NoRuntime,
}

//! Table statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for table transitions.
#[derive(Debug, Default)]
pub struct PendingStats {
    /// Requests registered.
    pub total_registered: AtomicU64,
    /// Requests answered with a response.
    pub total_completed: AtomicU64,
    /// Requests answered with an error frame or failed by the transport.
    pub total_errored: AtomicU64,
    /// Requests that hit their deadline.
    pub total_timeouts: AtomicU64,
    /// Requests abandoned by their caller.
    pub total_cancelled: AtomicU64,
    /// Replies for ids with no entry.
    pub total_discarded: AtomicU64,
}

/// Point-in-time copy of [`PendingStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingStatsSnapshot {
    pub registered: u64,
    pub completed: u64,
    pub errored: u64,
    pub timeouts: u64,
    pub cancelled: u64,
    pub discarded: u64,
}

impl PendingStats {
    #[must_use]
    pub fn snapshot(&self) -> PendingStatsSnapshot {
        PendingStatsSnapshot {
            registered: self.total_registered.load(Ordering::Relaxed),
            completed: self.total_completed.load(Ordering::Relaxed),
            errored: self.total_errored.load(Ordering::Relaxed),
            timeouts: self.total_timeouts.load(Ordering::Relaxed),
            cancelled: self.total_cancelled.load(Ordering::Relaxed),
            discarded: self.total_discarded.load(Ordering::Relaxed),
        }
    }
}

impl PendingStatsSnapshot {
    /// Entries that reached a terminal state.
    #[must_use]
    pub fn terminated(&self) -> u64 {
        self.completed + self.errored + self.timeouts + self.cancelled
    }
}

//! # In-Memory Transport
//!
//! Wires adapters in the same process together over tokio channels: each
//! side's outbound queue feeds the other side's read loop. Used for
//! multi-node setups inside one binary and for the scenario tests.

use crate::service::Adapter;
use parking_lot::Mutex;
use shared_types::ConnectionId;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

/// The two ends of one in-memory link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelLink {
    /// Connection id on the left adapter.
    pub left: ConnectionId,
    /// Connection id on the right adapter.
    pub right: ConnectionId,
}

/// Owns the pump tasks of every link it created; dropping it severs them.
#[derive(Default)]
pub struct ChannelTransport {
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ChannelTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect two adapters and add a route to each other's node id.
    ///
    /// Closing either end ends the other end's read loop, which closes it
    /// too. Must be called from within a tokio runtime.
    pub fn link(&self, left: &Adapter, right: &Adapter) -> ChannelLink {
        let (left_id, left_out) = left.input().open_connection();
        let (right_id, right_out) = right.input().open_connection();
        left.routes().add_route(right.local().clone(), left_id);
        right.routes().add_route(left.local().clone(), right_id);

        let into_right = right.input().clone();
        let into_left = left.input().clone();
        let mut tasks = self.tasks.lock();
        tasks.push(tokio::spawn(async move {
            into_right.run(right_id, ReceiverStream::new(left_out)).await;
        }));
        tasks.push(tokio::spawn(async move {
            into_left.run(left_id, ReceiverStream::new(right_out)).await;
        }));

        debug!(
            left = %left.local(),
            right = %right.local(),
            "In-memory link established"
        );
        ChannelLink {
            left: left_id,
            right: right_id,
        }
    }

    /// Number of pump tasks still running.
    #[must_use]
    pub fn active_pumps(&self) -> usize {
        let mut tasks = self.tasks.lock();
        tasks.retain(|task| !task.is_finished());
        tasks.len()
    }
}

impl Drop for ChannelTransport {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}

impl std::fmt::Debug for ChannelTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelTransport")
            .field("pumps", &self.tasks.lock().len())
            .finish()
    }
}

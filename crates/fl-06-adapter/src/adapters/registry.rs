//! # Connection Registry
//!
//! One bounded outbound queue per open connection. Whatever drives the
//! connection (a WebSocket writer, an in-memory link) drains the receiving
//! half; the dispatcher only ever enqueues.

use dashmap::DashMap;
use fl_01_envelope::Frame;
use fl_05_dispatch::{Transport, TransportError};
use shared_types::ConnectionId;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

#[derive(Debug)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, mpsc::Sender<Frame>>,
    buffer: usize,
}

impl ConnectionRegistry {
    /// Registry whose connections queue up to `buffer` frames each.
    #[must_use]
    pub fn new(buffer: usize) -> Self {
        Self {
            connections: DashMap::new(),
            buffer: buffer.max(1),
        }
    }

    /// Open a connection. The receiver yields the frames to write to it.
    pub fn open(&self) -> (ConnectionId, mpsc::Receiver<Frame>) {
        let connection = ConnectionId::new();
        let (sender, receiver) = mpsc::channel(self.buffer);
        self.connections.insert(connection, sender);
        debug!(connection = %connection, "Connection registered");
        (connection, receiver)
    }

    /// Forget a connection. Its writer sees the queue end once drained.
    pub fn close(&self, connection: ConnectionId) -> bool {
        self.connections.remove(&connection).is_some()
    }

    #[must_use]
    pub fn contains(&self, connection: ConnectionId) -> bool {
        self.connections.contains_key(&connection)
    }

    #[must_use]
    pub fn connections(&self) -> Vec<ConnectionId> {
        self.connections.iter().map(|entry| *entry.key()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl Transport for ConnectionRegistry {
    fn send_frame(&self, connection: ConnectionId, frame: Frame) -> Result<(), TransportError> {
        let sender = self
            .connections
            .get(&connection)
            .map(|entry| entry.value().clone())
            .ok_or(TransportError::UnknownConnection(connection))?;

        sender.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => TransportError::QueueFull(connection),
            TrySendError::Closed(_) => {
                self.connections.remove(&connection);
                TransportError::Closed(connection)
            }
        })
    }
}

//! # Node Runtime
//!
//! ## Startup Sequence
//!
//! 1. Assemble the adapter from configuration
//! 2. Start the event logger
//! 3. Start the WebSocket server (if enabled)
//! 4. Signal ready
//!
//! Shutdown flips a watch channel every spawned task selects on.

use crate::builtin::builtin_handlers;
use anyhow::{Context, Result};
use fl_06_adapter::{websocket, Adapter, AdapterConfig};
use shared_bus::{AdapterEvent, EventFilter};
use tokio::sync::watch;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};

/// A running node.
pub struct NodeRuntime {
    adapter: Adapter,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl NodeRuntime {
    /// Assemble the node described by `config`.
    pub fn new(config: AdapterConfig) -> Result<Self> {
        let handlers = builtin_handlers()
            .context("Failed to register built-in handlers")?
            .build();
        let adapter = Adapter::builder(config)
            .handlers(handlers)
            .build()
            .context("Failed to assemble adapter")?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            adapter,
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Start background tasks. Returns once they are spawned.
    pub async fn start(&self) -> Result<()> {
        info!("===========================================");
        info!("  Fieldlink Node Runtime v{}", env!("CARGO_PKG_VERSION"));
        info!("  Node: {}", self.adapter.local());
        info!("===========================================");

        self.start_event_logger();

        let websocket = self.adapter.websocket_config().clone();
        if websocket.enabled {
            let adapter = self.adapter.clone();
            let mut shutdown = self.shutdown_rx.clone();
            tokio::spawn(async move {
                tokio::select! {
                    result = websocket::serve(adapter) => {
                        if let Err(e) = result {
                            error!(error = %e, "WebSocket server stopped");
                        }
                    }
                    _ = shutdown.changed() => {
                        info!("[websocket] Shutdown signal received");
                    }
                }
            });
            info!(addr = %websocket.addr(), "WebSocket endpoint enabled");
        } else {
            warn!("WebSocket server disabled, node is reachable in-process only");
        }

        Ok(())
    }

    /// Mirror bus events into the log.
    fn start_event_logger(&self) {
        let mut events = self.adapter.events().event_stream(EventFilter::all());
        let mut shutdown = self.shutdown_rx.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = events.next() => match event {
                        Some(AdapterEvent::RequestFailed { correlation_id, action, kind }) => {
                            warn!(correlation_id = %correlation_id, action = %action, ?kind, "Request failed");
                        }
                        Some(event) => debug!(topic = ?event.topic(), ?event, "Adapter event"),
                        None => break,
                    },
                    _ = shutdown.changed() => break,
                }
            }
        });
    }

    /// Signal every task to stop and fail whatever is still in flight.
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown...");

        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }

        for connection in self.adapter.connections().connections() {
            self.adapter
                .input()
                .close_connection(connection, "node shutting down");
        }

        info!(
            pending = self.adapter.pending().pending_count(),
            "Shutdown complete"
        );
    }

    #[must_use]
    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }
}

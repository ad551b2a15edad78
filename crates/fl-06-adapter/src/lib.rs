//! # Adapter Facade (FL-06)
//!
//! The outermost layer of a node. Composes the envelope codec, signature
//! policy, pending-request table, forwarding engine and dispatcher behind
//! two halves:
//!
//! - [`AdapterIn`]: per-connection read loops (frame → parse → route)
//! - [`AdapterOut`]: `send(message) -> response` with per-action timeouts
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): [`AdapterConfig`] and the error types
//! - **Adapters Layer** (`adapters/`): [`ConnectionRegistry`] (the
//!   dispatcher's [`Transport`]), the axum WebSocket server and the
//!   in-memory [`ChannelTransport`]
//! - **Service Layer** (`service.rs`): [`Adapter`] and [`AdapterBuilder`]
//!
//! ## Connection Lifecycle
//!
//! ```text
//! open_connection ──► run (read loop) ──► stream ends ──► close_connection
//!        │                  │                                   │
//!  ConnectionOpened   parse → Dispatcher::route      pending entries fail,
//!                                                    routes removed,
//!                                                    ConnectionClosed
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! let adapter = Adapter::builder(config).handlers(handlers).build()?;
//! tokio::spawn(websocket::serve(adapter.clone()));
//! let status = adapter.output().send(Some(device), &Reset { kind }).await?;
//! ```

pub mod adapters;
pub mod domain;
pub mod service;

pub use adapters::channel::{ChannelLink, ChannelTransport};
pub use adapters::registry::ConnectionRegistry;
pub use adapters::websocket;
pub use domain::config::{
    AdapterConfig, ConfigError, NodeConfig, TimeoutConfig, WebSocketConfig,
    DEFAULT_MAX_MESSAGE_SIZE,
};
pub use domain::errors::AdapterError;
pub use fl_05_dispatch::{Transport, TransportError};
pub use service::{Adapter, AdapterBuilder, AdapterIn, AdapterOut};

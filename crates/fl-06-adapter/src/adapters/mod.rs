//! # Adapters Layer
//!
//! Concrete transports behind the dispatcher's `Transport` port.

pub mod channel;
pub mod registry;
pub mod websocket;

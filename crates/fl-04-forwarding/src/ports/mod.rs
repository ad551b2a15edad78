//! # Ports Layer
//!
//! - **Inbound (Driving)**: [`inbound::ForwardingApi`], called by the
//!   dispatcher for every request addressed to another node.
//! - **Outbound (Driven)**: [`outbound::ForwardingFilter`], the pluggable
//!   policy the engine consults.

pub mod inbound;
pub mod outbound;

//! # Ports Layer
//!
//! - **Inbound (Driving)**: the evaluation API used by the dispatcher and
//!   the adapter facade.

pub mod inbound;

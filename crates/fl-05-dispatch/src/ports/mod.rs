//! # Ports Layer
//!
//! - **Outbound (Driven)**: the [`outbound::Transport`] frames leave
//!   through and the [`outbound::RequestHandler`]s requests are handed to.

pub mod outbound;

//! # Dispatch Router (FL-05)
//!
//! Takes every parsed inbound envelope and sends it where it belongs: a
//! local handler, the forwarding engine, or the caller waiting on the
//! pending-request table. Also owns the outbound call path.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): [`RoutingTable`] and the error types
//! - **Ports Layer** (`ports/`): [`Transport`] and [`RequestHandler`] (driven)
//! - **Handlers** (`handlers.rs`): the frozen [`HandlerRegistry`]
//! - **Service Layer** (`service.rs`): [`Dispatcher`]
//!
//! ## Flow
//!
//! ```text
//! Request ──► addressed to us? ──yes──► verify ──► handler ──► sign ──► reply
//!                  │ no
//!                  ▼
//!            ForwardingApi ──► Transmit ──► pending (forwarded) ──► next hop
//!                         └──► Respond ───► reply to sender
//!
//! Response / RequestError ──► verify (local callers only) ──► pending table
//! ResponseError ──► relay toward destination, or report to observers
//! ```
//!
//! Handlers run on their own tasks, so a handler that calls back out over
//! the connection it was invoked from cannot stall that connection's reader.

pub mod domain;
pub mod handlers;
pub mod ports;
pub mod service;

pub use domain::errors::{DispatchError, HandlerError, TransportError};
pub use domain::routing::{Route, RoutingTable};
pub use handlers::{handler_fn, FnHandler, HandlerRegistry, HandlerRegistryBuilder, MessageHandler};
pub use ports::outbound::{HandlerContext, RequestHandler, Transport};
pub use service::{Dispatcher, DispatcherBuilder, ResponseErrorReport, DEFAULT_RELAY_TIMEOUT};

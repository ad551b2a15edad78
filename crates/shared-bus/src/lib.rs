//! # Shared Bus - Lifecycle Hooks for the Adapter Engine
//!
//! Two complementary ways to observe the engine:
//!
//! - [`ObserverList`]: ordered synchronous callbacks invoked inline at a
//!   specific hook (request received, decision filtered, message sent).
//!   Each callback is isolated; failures are logged and swallowed.
//! - [`InMemoryEventBus`]: a broadcast channel of [`AdapterEvent`]s for
//!   sinks that want to consume lifecycle transitions asynchronously.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │ Pending /    │                    │ Log sink,    │
//! │ Forwarding / │    publish()       │ tests, ...   │
//! │ Dispatch     │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │  Event Bus   │          │
//!                  │              │ ─────────┘
//!                  └──────────────┘  subscribe()
//! ```

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod observers;
pub mod publisher;
pub mod subscriber;

pub use events::{AdapterEvent, EventFilter, EventTopic, ForwardingOutcome};
pub use observers::{panic_message, NotifyReport, ObserverError, ObserverList};
pub use publisher::{EventPublisher, InMemoryEventBus, NullPublisher};
pub use subscriber::{EventStream, Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before the oldest are dropped.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

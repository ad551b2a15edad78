//! # Pending Requests
//!
//! Correlates outbound requests with the frames that answer them.
//!
//! ```text
//!   register(id) ──► [ (initiator, id) → entry ] ──► Waiter
//!                                │
//!          resolve / fail / cancel / timeout / connection closed
//!                                │
//!                                ▼
//!               entry removed, waiter settled exactly once
//! ```
//!
//! The table is shared by every connection of an adapter. Requests this
//! node relays on behalf of a peer live in the same table, tagged with
//! [`Origin::Forwarded`], so a relay answers late or duplicate responses
//! exactly as an originating node does. Each peer a relay serves keeps its
//! own correlation id space.

pub mod domain;
pub mod service;
pub mod waiter;

pub use domain::entry::{Origin, PendingInfo, PendingKey, PendingOutcome, Reply};
pub use domain::errors::PendingError;
pub use domain::stats::{PendingStats, PendingStatsSnapshot};
pub use service::PendingRequestTable;
pub use waiter::Waiter;

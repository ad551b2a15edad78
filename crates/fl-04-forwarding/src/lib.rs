//! # Forwarding Decision Engine (FL-04)
//!
//! Decides whether a relay passes on, rewrites or answers a request that is
//! addressed to another node.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): [`ForwardingResult`] candidates, the
//!   tie-break in [`select`], and the finalized [`ForwardingDecision`]
//! - **Ports Layer** (`ports/`): [`ForwardingApi`] (driving) and
//!   [`ForwardingFilter`] (driven plug-ins)
//! - **Filters** (`filters.rs`): configurable allow/deny lists
//! - **Service Layer** (`service.rs`): [`ForwardingEngine`]
//!
//! ## Decision Rules
//!
//! | Situation | Result |
//! |-----------|--------|
//! | Filters disagree | highest priority, then Reject > Replace > Forward, then earliest registered |
//! | No filter decides | configured [`DefaultPolicy`] |
//! | Reject without response | signed `Filtered` request error |
//! | Replace | original correlation id kept, re-signed by this node |
//! | Filter panics | logged, counts as undecided |

pub mod domain;
pub mod filters;
pub mod ports;
pub mod service;

pub use domain::config::{DefaultPolicy, ForwardingConfig};
pub use domain::context::ForwardingContext;
pub use domain::decision::{
    select, Candidate, Disposition, ForwardingDecision, ForwardingResult, SendReceipt, SentNotice,
};
pub use filters::{builtin_filters, ActionFilter, DestinationFilter};
pub use ports::inbound::ForwardingApi;
pub use ports::outbound::ForwardingFilter;
pub use service::ForwardingEngine;

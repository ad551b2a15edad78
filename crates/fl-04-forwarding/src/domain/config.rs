//! Forwarding configuration.

use crate::domain::decision::ForwardingResult;
use fl_02_signature_policy::ActionPattern;
use serde::{Deserialize, Serialize};
use shared_types::NodeId;

/// What happens to a relayed request that no filter decided on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DefaultPolicy {
    #[default]
    Forward,
    Reject,
}

impl DefaultPolicy {
    #[must_use]
    pub fn result(self) -> ForwardingResult {
        match self {
            DefaultPolicy::Forward => ForwardingResult::Forward,
            DefaultPolicy::Reject => ForwardingResult::reject(),
        }
    }
}

/// Relay settings, including the lists behind the built-in filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ForwardingConfig {
    pub default_policy: DefaultPolicy,

    /// If non-empty, only matching actions are relayed.
    pub allowed_actions: Vec<ActionPattern>,

    /// Matching actions are never relayed.
    pub denied_actions: Vec<ActionPattern>,

    /// Requests for these destinations are never relayed.
    pub denied_destinations: Vec<NodeId>,

    /// Priority of the built-in filters.
    pub filter_priority: i32,
}

//! # Built-in Filters
//!
//! Allow/deny lists driven by [`ForwardingConfig`]. Both filters only ever
//! reject; a request they do not object to is left undecided.

use crate::domain::config::ForwardingConfig;
use crate::domain::context::ForwardingContext;
use crate::domain::decision::ForwardingResult;
use crate::ports::outbound::ForwardingFilter;
use fl_02_signature_policy::ActionPattern;
use shared_types::NodeId;
use std::collections::HashSet;
use std::sync::Arc;

/// Rejects actions outside the allow list or on the deny list.
#[derive(Debug, Clone, Default)]
pub struct ActionFilter {
    allowed: Vec<ActionPattern>,
    denied: Vec<ActionPattern>,
    priority: i32,
}

impl ActionFilter {
    #[must_use]
    pub fn new(allowed: Vec<ActionPattern>, denied: Vec<ActionPattern>) -> Self {
        Self {
            allowed,
            denied,
            priority: 0,
        }
    }

    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    fn permits(&self, action: &str) -> bool {
        let allowed = self.allowed.is_empty() || self.allowed.iter().any(|p| p.matches(action));
        allowed && !self.denied.iter().any(|p| p.matches(action))
    }
}

impl ForwardingFilter for ActionFilter {
    fn name(&self) -> &str {
        "action-filter"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn evaluate(&self, context: &ForwardingContext) -> Option<ForwardingResult> {
        (!self.permits(context.action())).then(ForwardingResult::reject)
    }
}

/// Rejects requests for deny-listed destinations.
#[derive(Debug, Clone, Default)]
pub struct DestinationFilter {
    denied: HashSet<NodeId>,
    priority: i32,
}

impl DestinationFilter {
    #[must_use]
    pub fn new(denied: impl IntoIterator<Item = NodeId>) -> Self {
        Self {
            denied: denied.into_iter().collect(),
            priority: 0,
        }
    }

    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl ForwardingFilter for DestinationFilter {
    fn name(&self) -> &str {
        "destination-filter"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn evaluate(&self, context: &ForwardingContext) -> Option<ForwardingResult> {
        context
            .destination()
            .filter(|destination| self.denied.contains(*destination))
            .map(|_| ForwardingResult::reject())
    }
}

/// The built-in filters `config` asks for. Empty lists add no filter.
#[must_use]
pub fn builtin_filters(config: &ForwardingConfig) -> Vec<Arc<dyn ForwardingFilter>> {
    let mut filters: Vec<Arc<dyn ForwardingFilter>> = Vec::new();

    if !config.allowed_actions.is_empty() || !config.denied_actions.is_empty() {
        filters.push(Arc::new(
            ActionFilter::new(config.allowed_actions.clone(), config.denied_actions.clone())
                .with_priority(config.filter_priority),
        ));
    }
    if !config.denied_destinations.is_empty() {
        filters.push(Arc::new(
            DestinationFilter::new(config.denied_destinations.iter().cloned())
                .with_priority(config.filter_priority),
        ));
    }

    filters
}

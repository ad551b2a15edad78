//! # Outbound Ports (Driven Ports / SPI)

use crate::domain::context::ForwardingContext;
use crate::domain::decision::ForwardingResult;

/// A forwarding policy plug-in.
///
/// Filters are evaluated independently of each other, in registration
/// order. Returning `None` leaves the decision to other filters or to the
/// default policy.
pub trait ForwardingFilter: Send + Sync {
    /// Name used in logs and decisions.
    fn name(&self) -> &str;

    /// Higher priorities win when filters disagree.
    fn priority(&self) -> i32 {
        0
    }

    fn evaluate(&self, context: &ForwardingContext) -> Option<ForwardingResult>;
}

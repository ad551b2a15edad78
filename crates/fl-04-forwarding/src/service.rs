//! # Forwarding Engine
//!
//! Pipeline for a request addressed to another node:
//!
//! ```text
//! Received ──► received observers
//!    │
//!    ▼
//! Filtered ──► every filter, one candidate each (or none)
//!    │         winner: priority, then most restrictive, then earliest
//!    │         no candidate: default policy
//!    ▼
//!    ├── Forward / Replace ──► Forwarding ──► Sent (SendReceipt)
//!    └── Reject ────────────► Rejected (signed response)
//!
//! filtered observers see every final decision
//! ```

use crate::domain::config::{DefaultPolicy, ForwardingConfig};
use crate::domain::context::ForwardingContext;
use crate::domain::decision::{
    select, Candidate, ForwardingDecision, ForwardingResult, SentNotice, Verdict,
};
use crate::filters::builtin_filters;
use crate::ports::inbound::ForwardingApi;
use crate::ports::outbound::ForwardingFilter;
use fl_01_envelope::{Envelope, Request};
use fl_02_signature_policy::{Direction, SignResult, SignaturePolicyApi};
use parking_lot::RwLock;
use shared_bus::{
    panic_message, AdapterEvent, EventPublisher, NullPublisher, ObserverError, ObserverList,
};
use shared_types::{ConnectionId, ErrorCode, NodeId};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

/// Forwarding decision engine for one node.
pub struct ForwardingEngine {
    local: NodeId,
    default_policy: DefaultPolicy,
    filters: RwLock<Vec<Arc<dyn ForwardingFilter>>>,
    received: ObserverList<ForwardingContext>,
    filtered: ObserverList<ForwardingDecision>,
    sent: Arc<ObserverList<SentNotice>>,
    policy: Arc<dyn SignaturePolicyApi>,
    events: Arc<dyn EventPublisher>,
}

impl ForwardingEngine {
    #[must_use]
    pub fn new(
        local: NodeId,
        default_policy: DefaultPolicy,
        policy: Arc<dyn SignaturePolicyApi>,
    ) -> Self {
        Self {
            local,
            default_policy,
            filters: RwLock::new(Vec::new()),
            received: ObserverList::new("forwarding.received"),
            filtered: ObserverList::new("forwarding.filtered"),
            sent: Arc::new(ObserverList::new("forwarding.sent")),
            policy,
            events: Arc::new(NullPublisher),
        }
    }

    /// Engine with the default policy and built-in filters from `config`.
    #[must_use]
    pub fn from_config(
        local: NodeId,
        config: &ForwardingConfig,
        policy: Arc<dyn SignaturePolicyApi>,
    ) -> Self {
        let engine = Self::new(local, config.default_policy, policy);
        for filter in builtin_filters(config) {
            engine.add_filter(filter);
        }
        engine
    }

    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = events;
        self
    }

    #[must_use]
    pub fn default_policy(&self) -> DefaultPolicy {
        self.default_policy
    }

    /// Register a filter after all existing ones.
    pub fn add_filter(&self, filter: Arc<dyn ForwardingFilter>) {
        debug!(filter = filter.name(), priority = filter.priority(), "Registered forwarding filter");
        self.filters.write().push(filter);
    }

    /// Remove every filter named `name`. Returns how many were removed.
    pub fn remove_filter(&self, name: &str) -> usize {
        let mut filters = self.filters.write();
        let before = filters.len();
        filters.retain(|f| f.name() != name);
        before - filters.len()
    }

    #[must_use]
    pub fn filter_count(&self) -> usize {
        self.filters.read().len()
    }

    /// Observe every request before filters run.
    pub fn on_received<F>(&self, name: impl Into<String>, callback: F)
    where
        F: Fn(&ForwardingContext) -> Result<(), ObserverError> + Send + Sync + 'static,
    {
        self.received.add(name, callback);
    }

    /// Observe every final decision.
    pub fn on_filtered<F>(&self, name: impl Into<String>, callback: F)
    where
        F: Fn(&ForwardingDecision) -> Result<(), ObserverError> + Send + Sync + 'static,
    {
        self.filtered.add(name, callback);
    }

    /// Observe transport results of forwarded and replaced requests.
    pub fn on_sent<F>(&self, name: impl Into<String>, callback: F)
    where
        F: Fn(&SentNotice) -> Result<(), ObserverError> + Send + Sync + 'static,
    {
        self.sent.add(name, callback);
    }

    fn run_filters(&self, context: &ForwardingContext) -> Option<Candidate> {
        let filters: Vec<Arc<dyn ForwardingFilter>> = self.filters.read().clone();
        let mut candidates = Vec::new();

        for (index, filter) in filters.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| filter.evaluate(context))) {
                Ok(Some(result)) => candidates.push(Candidate {
                    filter: filter.name().to_string(),
                    priority: filter.priority(),
                    index,
                    result,
                }),
                Ok(None) => {}
                Err(payload) => warn!(
                    correlation_id = %context.correlation_id(),
                    filter = filter.name(),
                    panic = %panic_message(payload.as_ref()),
                    "Forwarding filter panicked, treating it as undecided"
                ),
            }
        }

        select(candidates)
    }

    fn finalize(
        &self,
        request: &Request,
        result: ForwardingResult,
        decided_by: Option<&str>,
    ) -> (Verdict, String) {
        let by = decided_by.map_or_else(
            || "default policy".to_string(),
            |name| format!("filter {name}"),
        );

        match result {
            ForwardingResult::Forward => (
                Verdict::Forward,
                format!("forwarding {} ({by})", request.action),
            ),
            ForwardingResult::Replace { request: replacement } => {
                self.finalize_replace(request, replacement, &by)
            }
            ForwardingResult::Reject { response } => {
                let response = match response {
                    Some(response) => Self::answer_for(request, response),
                    None => Envelope::RequestError(request.error_reply(
                        &self.local,
                        ErrorCode::Filtered,
                        format!("request filtered by {by}"),
                    )),
                };
                (
                    Verdict::Reject(self.policy.sign_reply(response, &request.action)),
                    format!("rejected {} ({by})", request.action),
                )
            }
        }
    }

    /// A filter's own answer goes to the originator under the request's id.
    fn answer_for(request: &Request, mut response: Envelope) -> Envelope {
        if response.correlation_id() != &request.correlation_id {
            warn!(
                correlation_id = %request.correlation_id,
                response_id = %response.correlation_id(),
                "Rejection response must answer the original correlation id"
            );
            *response.correlation_id_mut() = request.correlation_id.clone();
        }
        response
    }

    fn finalize_replace(
        &self,
        original: &Request,
        mut replacement: Request,
        by: &str,
    ) -> (Verdict, String) {
        if replacement.correlation_id != original.correlation_id {
            warn!(
                correlation_id = %original.correlation_id,
                replacement_id = %replacement.correlation_id,
                "Replacement request must keep the original correlation id"
            );
            replacement.correlation_id = original.correlation_id.clone();
        }

        // The originator's signatures covered the old payload.
        replacement.header.signatures.clear();
        let mut envelope = Envelope::Request(replacement.clone());
        match self
            .policy
            .evaluate(&mut envelope, &replacement.action, Direction::Outgoing)
        {
            SignResult::Pass => {
                replacement.header.signatures = envelope.signatures().to_vec();
                (
                    Verdict::Replace(replacement),
                    format!("replaced {} ({by})", original.action),
                )
            }
            SignResult::Fail(reason) => {
                let response = Envelope::RequestError(original.error_reply(
                    &self.local,
                    ErrorCode::SecurityError,
                    reason,
                ));
                (
                    Verdict::Reject(self.policy.sign_reply(response, &original.action)),
                    format!("rejected {}: replacement could not be signed ({by})", original.action),
                )
            }
        }
    }
}

impl ForwardingApi for ForwardingEngine {
    fn decide(&self, request: Request, connection: ConnectionId) -> ForwardingDecision {
        let context = ForwardingContext {
            request,
            connection,
            local: self.local.clone(),
        };
        self.received.notify(&context);

        let (result, decided_by) = match self.run_filters(&context) {
            Some(candidate) => (candidate.result, Some(candidate.filter)),
            None => (self.default_policy.result(), None),
        };

        let ForwardingContext { request, .. } = context;
        let (verdict, log_message) = self.finalize(&request, result, decided_by.as_deref());

        let decision = ForwardingDecision {
            request,
            connection,
            verdict,
            decided_by,
            log_message,
            sent: Arc::clone(&self.sent),
            events: Arc::clone(&self.events),
        };

        if matches!(decision.verdict, Verdict::Reject(_)) {
            warn!(
                correlation_id = %decision.correlation_id(),
                connection = %connection,
                "{}",
                decision.log_message()
            );
        } else {
            debug!(
                correlation_id = %decision.correlation_id(),
                connection = %connection,
                "{}",
                decision.log_message()
            );
        }

        self.filtered.notify(&decision);
        self.events.publish(AdapterEvent::ForwardingDecided {
            correlation_id: decision.correlation_id().clone(),
            action: decision.action().to_string(),
            outcome: decision.outcome(),
        });

        decision
    }
}

impl std::fmt::Debug for ForwardingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForwardingEngine")
            .field("local", &self.local)
            .field("default_policy", &self.default_policy)
            .field("filters", &self.filter_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::decision::Disposition;
    use crate::filters::ActionFilter;
    use fl_01_envelope::{Payload, Response};
    use fl_02_signature_policy::{
        ActionPattern, KeyStore, PolicySnapshot, SignatureRequirement, SignaturePolicy,
        SignatureRule, SigningKey,
    };
    use parking_lot::Mutex;
    use shared_bus::{EventFilter, EventTopic, ForwardingOutcome, InMemoryEventBus};
    use shared_crypto::HmacKey;

    struct Fixed {
        name: &'static str,
        priority: i32,
        result: Option<ForwardingResult>,
    }

    impl ForwardingFilter for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn evaluate(&self, _: &ForwardingContext) -> Option<ForwardingResult> {
            self.result.clone()
        }
    }

    struct Panicking;

    impl ForwardingFilter for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        fn evaluate(&self, _: &ForwardingContext) -> Option<ForwardingResult> {
            panic!("filter bug")
        }
    }

    /// Rejects with a custom response built from the context.
    struct CustomReject;

    impl ForwardingFilter for CustomReject {
        fn name(&self) -> &str {
            "custom"
        }

        fn evaluate(&self, ctx: &ForwardingContext) -> Option<ForwardingResult> {
            let payload = Payload::from_json_str(r#"{"status":"Rejected"}"#).ok()?;
            Some(ForwardingResult::reject_with(ctx.reply(payload)))
        }
    }

    fn node(id: &str) -> NodeId {
        NodeId::new(id).unwrap()
    }

    fn signing_policy() -> Arc<SignaturePolicy> {
        let mut keys = KeyStore::new();
        keys.add_signing_key("relay", SigningKey::Hmac(HmacKey::new(b"secret".to_vec()).unwrap()));
        Arc::new(SignaturePolicy::new(PolicySnapshot {
            rules: vec![SignatureRule::new(ActionPattern::Any, SignatureRequirement::SignAndVerify)],
            default_requirement: SignatureRequirement::None,
            keys,
        }))
    }

    fn engine(default_policy: DefaultPolicy) -> ForwardingEngine {
        ForwardingEngine::new(node("relay"), default_policy, signing_policy())
    }

    fn request(id: &str, action: &str) -> Request {
        Request::new(action, Payload::from_json_str(r#"{"a":1}"#).unwrap())
            .with_correlation_id(id)
            .with_destination(node("cp-1"))
            .with_path(shared_types::NetworkPath::from_hops(vec![node("csms")]))
    }

    #[test]
    fn test_default_forward() {
        let engine = engine(DefaultPolicy::Forward);
        let decision = engine.decide(request("1", "Heartbeat"), ConnectionId::new());

        assert_eq!(decision.outcome(), ForwardingOutcome::Forward);
        assert!(decision.decided_by().is_none());
        match decision.into_disposition() {
            Disposition::Transmit { request, .. } => assert_eq!(request.correlation_id.as_str(), "1"),
            other => panic!("unexpected disposition: {other:?}"),
        }
    }

    #[test]
    fn test_default_reject_synthesizes_signed_filtered_error() {
        let engine = engine(DefaultPolicy::Reject);
        let decision = engine.decide(request("9", "Reset"), ConnectionId::new());

        assert_eq!(decision.outcome(), ForwardingOutcome::Reject);
        match decision.into_disposition() {
            Disposition::Respond {
                response: Envelope::RequestError(error),
            } => {
                assert_eq!(error.correlation_id.as_str(), "9");
                assert_eq!(error.code, ErrorCode::Filtered);
                assert_eq!(error.header.signatures.len(), 1);
                // Back toward the originator.
                assert_eq!(error.header.path.hops(), [node("relay"), node("csms")].as_slice());
            }
            other => panic!("unexpected disposition: {other:?}"),
        }
    }

    #[test]
    fn test_custom_reject_response_is_signed() {
        let engine = engine(DefaultPolicy::Forward);
        engine.add_filter(Arc::new(CustomReject));

        let decision = engine.decide(request("9", "Reset"), ConnectionId::new());
        assert_eq!(decision.decided_by(), Some("custom"));
        let response = decision.rejection().unwrap().clone();

        assert_eq!(response.correlation_id().as_str(), "9");
        assert_eq!(response.payload().as_json(), Some(r#"{"status":"Rejected"}"#));
        assert_eq!(response.signatures().len(), 1);
    }

    #[test]
    fn test_custom_reject_answers_original_id() {
        let engine = engine(DefaultPolicy::Forward);
        let stray = Response::new("other", Payload::from_json_str(r#"{"status":"Rejected"}"#).unwrap());
        engine.add_filter(Arc::new(Fixed {
            name: "stray",
            priority: 0,
            result: Some(ForwardingResult::reject_with(Envelope::Response(stray))),
        }));

        let decision = engine.decide(request("9", "Reset"), ConnectionId::new());
        let response = decision.rejection().unwrap();
        assert_eq!(response.correlation_id().as_str(), "9");
        assert_eq!(response.signatures().len(), 1);
    }

    #[test]
    fn test_most_restrictive_wins_over_registration_order() {
        let engine = engine(DefaultPolicy::Forward);
        engine.add_filter(Arc::new(Fixed {
            name: "allow",
            priority: 0,
            result: Some(ForwardingResult::Forward),
        }));
        engine.add_filter(Arc::new(Fixed {
            name: "deny",
            priority: 0,
            result: Some(ForwardingResult::reject()),
        }));

        let decision = engine.decide(request("1", "Reset"), ConnectionId::new());
        assert_eq!(decision.outcome(), ForwardingOutcome::Reject);
        assert_eq!(decision.decided_by(), Some("deny"));
    }

    #[test]
    fn test_priority_overrides_restrictiveness() {
        let engine = engine(DefaultPolicy::Reject);
        engine.add_filter(Arc::new(Fixed {
            name: "deny",
            priority: 0,
            result: Some(ForwardingResult::reject()),
        }));
        engine.add_filter(Arc::new(Fixed {
            name: "override",
            priority: 10,
            result: Some(ForwardingResult::Forward),
        }));

        let decision = engine.decide(request("1", "Reset"), ConnectionId::new());
        assert_eq!(decision.outcome(), ForwardingOutcome::Forward);
    }

    #[test]
    fn test_panicking_filter_is_undecided() {
        let engine = engine(DefaultPolicy::Forward);
        engine.add_filter(Arc::new(Panicking));

        let decision = engine.decide(request("1", "Heartbeat"), ConnectionId::new());
        assert_eq!(decision.outcome(), ForwardingOutcome::Forward);
        assert!(decision.decided_by().is_none());
    }

    #[test]
    fn test_replace_keeps_id_and_resigns() {
        let engine = engine(DefaultPolicy::Forward);
        let mut rewritten = request("other", "Reset");
        rewritten.payload = Payload::from_json_str(r#"{"a":2}"#).unwrap();
        rewritten.header.signatures.push(fl_01_envelope::Signature {
            key_id: "csms".into(),
            algorithm: fl_01_envelope::SignatureAlgorithm::HmacSha256,
            value: "00".into(),
        });
        engine.add_filter(Arc::new(Fixed {
            name: "rewrite",
            priority: 0,
            result: Some(ForwardingResult::replace(rewritten)),
        }));

        let decision = engine.decide(request("5", "Reset"), ConnectionId::new());
        let replacement = decision.replacement().unwrap();
        assert_eq!(replacement.correlation_id.as_str(), "5");
        assert_eq!(replacement.header.signatures.len(), 1);
        assert_eq!(replacement.header.signatures[0].key_id, "relay");
    }

    #[test]
    fn test_builtin_filters_from_config() {
        let config = ForwardingConfig {
            denied_actions: vec![ActionPattern::parse("Reset").unwrap()],
            ..ForwardingConfig::default()
        };
        let engine = ForwardingEngine::from_config(node("relay"), &config, signing_policy());
        engine.add_filter(Arc::new(ActionFilter::default()));

        let decision = engine.decide(request("1", "Reset"), ConnectionId::new());
        assert_eq!(decision.decided_by(), Some("action-filter"));
        assert_eq!(decision.outcome(), ForwardingOutcome::Reject);
    }

    #[test]
    fn test_observers_fire_in_order() {
        let engine = engine(DefaultPolicy::Forward);
        let log = Arc::new(Mutex::new(Vec::new()));

        let l = Arc::clone(&log);
        engine.on_received("log", move |ctx| {
            l.lock().push(format!("received {}", ctx.correlation_id()));
            Ok(())
        });
        engine.on_received("broken", |_| Err("boom".into()));
        let l = Arc::clone(&log);
        engine.on_filtered("log", move |d| {
            l.lock().push(format!("filtered {:?}", d.outcome()));
            Ok(())
        });
        let l = Arc::clone(&log);
        engine.on_sent("log", move |n| {
            l.lock().push(format!("sent {}", n.next_hop.as_ref().map_or("-", NodeId::as_str)));
            Ok(())
        });

        let decision = engine.decide(request("1", "Heartbeat"), ConnectionId::new());
        assert_eq!(log.lock().len(), 2, "sent observers wait for transmission");

        match decision.into_disposition() {
            Disposition::Transmit { receipt, .. } => receipt.delivered(node("cp-1")),
            other => panic!("unexpected disposition: {other:?}"),
        }

        assert_eq!(
            *log.lock(),
            vec!["received 1", "filtered Forward", "sent cp-1"]
        );
    }

    #[test]
    fn test_events_published() {
        let bus = Arc::new(InMemoryEventBus::new());
        let mut sub = bus.subscribe(EventFilter::topics(vec![EventTopic::Forwarding]));
        let engine = engine(DefaultPolicy::Forward).with_events(bus.clone());

        let decision = engine.decide(request("1", "Heartbeat"), ConnectionId::new());
        if let Disposition::Transmit { receipt, .. } = decision.into_disposition() {
            receipt.delivered(node("cp-1"));
        }

        let events = sub.drain();
        assert!(matches!(
            events[0],
            AdapterEvent::ForwardingDecided { outcome: ForwardingOutcome::Forward, .. }
        ));
        assert!(matches!(events[1], AdapterEvent::RequestForwarded { .. }));
    }
}

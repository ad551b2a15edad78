//! # Relay Forwarding
//!
//! Relay-side policy: default verdicts, configured deny lists, custom
//! filters answering on the device's behalf, and relay timeouts.

#[cfg(test)]
mod tests {
    use crate::fixtures::{config, node, signed, Topology, CSMS, DEVICE, RELAY};
    use fl_01_envelope::{Payload, Request};
    use fl_02_signature_policy::ActionPattern;
    use fl_04_forwarding::{DefaultPolicy, ForwardingContext, ForwardingFilter, ForwardingResult};
    use shared_types::{ErrorCode, ErrorKind, RequestFailure};
    use std::sync::Arc;
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(5);

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    /// Answers request 9 itself instead of bothering the device.
    struct AnswerNine;

    impl ForwardingFilter for AnswerNine {
        fn name(&self) -> &str {
            "answer-nine"
        }

        fn priority(&self) -> i32 {
            10
        }

        fn evaluate(&self, context: &ForwardingContext) -> Option<ForwardingResult> {
            (context.correlation_id().as_str() == "9").then(|| {
                ForwardingResult::reject_with(
                    context.reply(Payload::from_json_str(r#"{"status":"Rejected"}"#).unwrap()),
                )
            })
        }
    }

    fn remote_code(failure: &RequestFailure) -> &ErrorCode {
        match failure {
            RequestFailure::Remote { code, .. } => code,
            other => panic!("expected a remote error, got {other:?}"),
        }
    }

    // =============================================================================
    // POLICY
    // =============================================================================

    #[tokio::test]
    async fn test_default_reject_filters_everything() {
        let mut relay = config(RELAY);
        relay.forwarding.default_policy = DefaultPolicy::Reject;
        let net = Topology::builder().relay(relay).build();

        let failure = net
            .csms
            .output()
            .call_with_timeout(net.to_device("f-1", "Reset", "{}"), TIMEOUT)
            .await
            .unwrap_err();

        assert_eq!(remote_code(&failure), &ErrorCode::Filtered);
        assert_eq!(failure.kind(), ErrorKind::Filtered);
        assert_eq!(net.device_calls(), 0);
        assert_eq!(net.relay.pending().pending_count(), 0);
    }

    #[tokio::test]
    async fn test_denied_action_filtered_others_forwarded() {
        let mut relay = config(RELAY);
        relay.forwarding.denied_actions = vec![ActionPattern::Exact("Reset".into())];
        let net = Topology::builder().relay(relay).build();

        let failure = net
            .csms
            .output()
            .call_with_timeout(net.to_device("f-2", "Reset", "{}"), TIMEOUT)
            .await
            .unwrap_err();
        assert_eq!(failure.kind(), ErrorKind::Filtered);

        net.csms
            .output()
            .call_with_timeout(net.to_device("f-3", "Echo", "{}"), TIMEOUT)
            .await
            .unwrap();
        assert_eq!(net.device_calls(), 1);
    }

    #[tokio::test]
    async fn test_filter_answers_for_device_with_signed_response() {
        let net = Topology::builder()
            .csms(signed(config(CSMS)))
            .relay(signed(config(RELAY)))
            .device(signed(config(DEVICE)))
            .with_relay(|builder| builder.filter(Arc::new(AnswerNine)))
            .build();

        let response = net
            .csms
            .output()
            .call_with_timeout(net.to_device("9", "Reset", "{}"), TIMEOUT)
            .await
            .unwrap();

        assert_eq!(response.payload.as_json(), Some(r#"{"status":"Rejected"}"#));
        assert!(!response.header.signatures.is_empty());
        assert_eq!(response.header.path.hops(), &[node(RELAY), node(CSMS)]);
        assert_eq!(net.device_calls(), 0);

        // Other ids pass the filter.
        net.csms
            .output()
            .call_with_timeout(net.to_device("10", "Reset", "{}"), TIMEOUT)
            .await
            .unwrap();
        assert_eq!(net.device_calls(), 1);
    }

    // =============================================================================
    // RELAY FAILURES
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_relay_gives_up_before_caller() {
        let mut relay = config(RELAY);
        relay.timeouts.relay_ms = 1_000;
        let net = Topology::builder().relay(relay).build();

        let failure = net
            .csms
            .output()
            .call_with_timeout(net.to_device("f-4", "Hang", "{}"), Duration::from_secs(30))
            .await
            .unwrap_err();

        assert_eq!(remote_code(&failure), &ErrorCode::GenericError);
        assert_eq!(net.relay.pending().pending_count(), 0);
        assert_eq!(net.relay.pending().stats().snapshot().timeouts, 1);
    }

    #[tokio::test]
    async fn test_same_id_in_flight_from_both_ends() {
        let net = Topology::new();

        let hanging = {
            let output = net.csms.output().clone();
            let request = net.to_device("1", "Hang", "{}");
            tokio::spawn(async move { output.call_with_timeout(request, TIMEOUT).await })
        };
        for _ in 0..100 {
            if net.device_calls() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert_eq!(net.device_calls(), 1);

        // The device reuses "1" for its own request while the CSMS's is held.
        let request = Request::new("BootNotification", Payload::empty())
            .with_correlation_id("1")
            .with_destination(node(CSMS));
        let failure = net
            .device
            .output()
            .call_with_timeout(request, TIMEOUT)
            .await
            .unwrap_err();
        assert_eq!(failure.kind(), ErrorKind::ActionNotSupported);

        assert_eq!(net.relay.pending().pending_count(), 1);
        assert_eq!(net.relay.pending().stats().snapshot().discarded, 0);
        assert!(!hanging.is_finished());
        hanging.abort();
    }

    #[tokio::test]
    async fn test_unknown_destination_reported_by_relay() {
        let net = Topology::new();
        net.csms.routes().add_route(node("cp-9"), net.uplink.right);

        let request = Request::new("Reset", Payload::empty())
            .with_correlation_id("f-5")
            .with_destination(node("cp-9"));
        let failure = net
            .csms
            .output()
            .call_with_timeout(request, TIMEOUT)
            .await
            .unwrap_err();

        let RequestFailure::Remote {
            code, description, ..
        } = &failure
        else {
            panic!("expected a remote error, got {failure:?}");
        };
        assert_eq!(code, &ErrorCode::GenericError);
        assert!(description.contains("cp-9"));
    }
}

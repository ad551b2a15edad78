//! # Integration Test Flows
//!
//! Plain request/response traffic across the three-node line:
//!
//! 1. **CSMS → device via relay**: the relay forwards, the device answers,
//!    the answer retraces the path
//! 2. **Device → CSMS over the default route**
//! 3. **Typed messages** end to end
//! 4. **Event bus**: each node reports its share of the exchange

#[cfg(test)]
mod tests {
    use crate::fixtures::{node, Topology, CSMS, DEVICE, RELAY};
    use fl_01_envelope::{Message, Payload, Request};
    use serde::{Deserialize, Serialize};
    use shared_bus::{AdapterEvent, EventFilter, EventTopic};
    use std::time::Duration;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Reset {
        reset_type: String,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct ResetResponse {
        status: String,
    }

    impl Message for Reset {
        const ACTION: &'static str = "Reset";
        type Response = ResetResponse;
    }

    // =============================================================================
    // REQUEST / RESPONSE ACROSS THE RELAY
    // =============================================================================

    #[tokio::test]
    async fn test_csms_reaches_device_through_relay() {
        let net = Topology::new();

        let response = net
            .csms
            .output()
            .call(net.to_device("1", "Echo", r#"{"connectorId":1}"#))
            .await
            .unwrap();

        assert_eq!(response.correlation_id.as_str(), "1");
        assert_eq!(response.payload.as_json(), Some(r#"{"connectorId":1}"#));
        assert_eq!(
            response.header.path.hops(),
            &[node(DEVICE), node(RELAY), node(CSMS)]
        );
        assert_eq!(net.device_calls(), 1);
        assert_eq!(net.csms.pending().pending_count(), 0);
        assert_eq!(net.relay.pending().pending_count(), 0);
    }

    #[tokio::test]
    async fn test_device_reaches_csms_over_default_route() {
        let net = Topology::new();

        // The CSMS has no handlers: the answer is a NotImplemented error
        // that travels back through the relay.
        let request = Request::new("BootNotification", Payload::empty())
            .with_correlation_id("boot-1")
            .with_destination(node(CSMS));
        let failure = net.device.output().call(request).await.unwrap_err();

        assert_eq!(failure.kind(), shared_types::ErrorKind::ActionNotSupported);
        assert_eq!(net.device.pending().pending_count(), 0);
    }

    #[tokio::test]
    async fn test_typed_message_round_trip() {
        let net = Topology::new();

        let response = net
            .csms
            .output()
            .send(
                Some(node(DEVICE)),
                &Reset {
                    reset_type: "Immediate".into(),
                },
            )
            .await
            .unwrap();

        assert_eq!(
            response,
            ResetResponse {
                status: "Accepted".into()
            }
        );
    }

    // =============================================================================
    // EVENT BUS
    // =============================================================================

    #[tokio::test]
    async fn test_each_node_reports_its_part() {
        let net = Topology::new();
        let mut relay_events = net
            .relay
            .events()
            .subscribe(EventFilter::topics(vec![EventTopic::Forwarding]));
        let mut device_events = net
            .device
            .events()
            .subscribe(EventFilter::topics(vec![EventTopic::Dispatch]));

        net.csms
            .output()
            .call_with_timeout(
                net.to_device("ev-1", "Echo", "{}"),
                Duration::from_secs(5),
            )
            .await
            .unwrap();

        let forwarded = relay_events
            .drain()
            .into_iter()
            .find_map(|event| match event {
                AdapterEvent::RequestForwarded { next_hop, .. } => Some(next_hop),
                _ => None,
            });
        assert_eq!(forwarded, Some(node(DEVICE)));

        let handled = device_events.drain().into_iter().any(|event| {
            matches!(
                event,
                AdapterEvent::RequestHandled { ref action, error_code: None, .. } if action == "Echo"
            )
        });
        assert!(handled);
    }
}

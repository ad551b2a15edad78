//! # Signatures Across Hops
//!
//! Signing happens at the ends of a path; relays carry signatures through
//! untouched.

#[cfg(test)]
mod tests {
    use crate::fixtures::{config, node, signed, Topology, CSMS, DEVICE, RELAY};
    use fl_05_dispatch::ResponseErrorReport;
    use parking_lot::Mutex;
    use shared_bus::{AdapterEvent, EventFilter, EventTopic};
    use shared_types::{ErrorCode, ErrorKind, RequestFailure, SourceRouting};
    use std::sync::Arc;
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(5);

    // =============================================================================
    // SIGNED END TO END
    // =============================================================================

    #[tokio::test]
    async fn test_signed_request_and_response_pass_every_hop() {
        let net = Topology::signed();

        let response = net
            .csms
            .output()
            .call_with_timeout(net.to_device("s-1", "Echo", r#"{"b":2,"a":1}"#), TIMEOUT)
            .await
            .unwrap();

        assert!(!response.header.signatures.is_empty());
        assert_eq!(
            response.header.path.hops(),
            &[node(DEVICE), node(RELAY), node(CSMS)]
        );
        assert_eq!(net.device_calls(), 1);
    }

    // =============================================================================
    // REJECTIONS
    // =============================================================================

    #[tokio::test]
    async fn test_unsigned_request_never_reaches_device_handler() {
        let net = Topology::builder().device(signed(config(DEVICE))).build();
        let mut device_events = net
            .device
            .events()
            .subscribe(EventFilter::topics(vec![EventTopic::Signatures]));

        let failure = net
            .csms
            .output()
            .call_with_timeout(net.to_device("s-2", "Reset", "{}"), TIMEOUT)
            .await
            .unwrap_err();

        let RequestFailure::Remote { code, .. } = &failure else {
            panic!("expected a remote error, got {failure:?}");
        };
        assert_eq!(*code, ErrorCode::SecurityError);
        assert_eq!(failure.kind(), ErrorKind::SignatureError);
        assert_eq!(net.device_calls(), 0);

        let rejected = device_events.drain().into_iter().any(|event| {
            matches!(event, AdapterEvent::SignatureRejected { ref action, .. } if action == "Reset")
        });
        assert!(rejected);
    }

    #[tokio::test]
    async fn test_unsigned_response_fails_caller_and_is_reported_back() {
        let net = Topology::builder().csms(signed(config(CSMS))).build();
        let reports: Arc<Mutex<Vec<ResponseErrorReport>>> = Arc::default();
        {
            let reports = reports.clone();
            net.device.on_response_error("collect", move |report| {
                reports.lock().push(report.clone());
                Ok(())
            });
        }

        let failure = net
            .csms
            .output()
            .call_with_timeout(net.to_device("s-3", "Echo", "{}"), TIMEOUT)
            .await
            .unwrap_err();
        assert_eq!(failure.kind(), ErrorKind::SignatureError);
        // The device did run the handler; only its answer was refused.
        assert_eq!(net.device_calls(), 1);

        // The complaint travels csms -> relay -> cp-1.
        for _ in 0..100 {
            if !reports.lock().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        let reports = reports.lock();
        assert_eq!(reports.len(), 1);
        let error = &reports[0].error;
        assert_eq!(error.correlation_id.as_str(), "s-3");
        assert_eq!(error.code, ErrorCode::SecurityError);
        assert_eq!(
            error.header.routing,
            Some(SourceRouting::Destination(node(DEVICE)))
        );
        assert_eq!(net.csms.pending().pending_count(), 0);
    }
}

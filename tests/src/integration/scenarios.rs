//! # Protocol Scenarios
//!
//! Behavior at the edges of the request lifecycle:
//!
//! - a device that never answers
//! - concurrent calls answered out of order
//! - a frame that cannot be parsed
//! - a response that arrives after its caller gave up
//! - a caller that stops waiting

#[cfg(test)]
mod tests {
    use crate::fixtures::{config, node, Slept, Topology, RELAY};
    use fl_01_envelope::{parse, Envelope, Frame, Payload, Request};
    use shared_types::{CorrelationId, ErrorCode, RequestFailure};
    use std::time::Duration;

    fn slept(response: &fl_01_envelope::Response) -> Slept {
        response.payload.deserialize().unwrap()
    }

    // =============================================================================
    // TIMEOUTS
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_request_times_out() {
        let mut relay = config(RELAY);
        relay.timeouts.relay_ms = 60_000;
        let net = Topology::builder().relay(relay).build();

        let result = net
            .csms
            .output()
            .call_with_timeout(net.to_device("7", "Hang", "{}"), Duration::from_secs(30))
            .await;

        assert_eq!(
            result,
            Err(RequestFailure::Timeout {
                after: Duration::from_secs(30)
            })
        );
        assert!(!net.csms.pending().is_pending(&CorrelationId::new("7")));
        assert_eq!(net.csms.pending().stats().snapshot().timeouts, 1);
        assert_eq!(net.device_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_response_is_discarded() {
        let net = Topology::new();
        let (connection, mut outbound) = net.csms.input().open_connection();

        let result = net
            .csms
            .dispatcher()
            .call_on(
                connection,
                Request::new("Heartbeat", Payload::empty()).with_correlation_id("3"),
                Duration::from_millis(100),
            )
            .await;
        assert!(matches!(result, Err(RequestFailure::Timeout { .. })));
        assert!(outbound.recv().await.is_some());

        tokio::time::sleep(Duration::from_millis(5)).await;
        net.csms
            .input()
            .handle_frame(connection, Frame::from(r#"[3,"3",{"currentTime":0}]"#));

        let stats = net.csms.pending().stats().snapshot();
        assert_eq!(stats.discarded, 1);
        assert_eq!(stats.completed, 0);
        assert_eq!(net.csms.pending().pending_count(), 0);
        // Nothing is sent back for a discarded response.
        assert!(outbound.try_recv().is_err());
    }

    // =============================================================================
    // CANCELLATION
    // =============================================================================

    /// A CSMS with a bare connection standing in for device `cp-7`.
    fn bare_device(net: &Topology) -> (shared_types::ConnectionId, tokio::sync::mpsc::Receiver<Frame>) {
        let (connection, outbound) = net.csms.input().open_connection();
        net.csms.routes().add_route(node("cp-7"), connection);
        (connection, outbound)
    }

    fn reset(id: &str) -> Request {
        Request::new("Reset", Payload::empty())
            .with_correlation_id(id)
            .with_destination(node("cp-7"))
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_call_discards_late_answer() {
        let net = Topology::new();
        let (connection, mut outbound) = bare_device(&net);

        tokio::select! {
            result = net.csms.output().call(reset("c-1")) => panic!("call finished early: {result:?}"),
            () = tokio::time::sleep(Duration::from_millis(100)) => {}
        }
        assert_eq!(net.csms.pending().pending_count(), 0);
        assert!(outbound.recv().await.is_some());

        net.csms.input().handle_frame(
            connection,
            Frame::from(r#"[3,"c-1",{"status":"Accepted"}]"#),
        );

        let stats = net.csms.pending().stats().snapshot();
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.discarded, 1);
        assert_eq!(stats.completed, 0);
    }

    #[tokio::test]
    async fn test_cancel_signal_aborts_call() {
        let net = Topology::new();
        let (connection, mut outbound) = bare_device(&net);
        let (cancel, cancelled) = tokio::sync::oneshot::channel::<()>();

        let output = net.csms.output().clone();
        let call = tokio::spawn(async move {
            output
                .call_with_cancel(reset("c-2"), async {
                    let _ = cancelled.await;
                })
                .await
        });
        assert!(outbound.recv().await.is_some());
        assert_eq!(net.csms.pending().pending_count(), 1);

        cancel.send(()).unwrap();
        assert_eq!(call.await.unwrap(), Err(RequestFailure::Cancelled));
        assert_eq!(net.csms.pending().pending_count(), 0);

        net.csms.input().handle_frame(
            connection,
            Frame::from(r#"[3,"c-2",{"status":"Accepted"}]"#),
        );
        assert_eq!(net.csms.pending().stats().snapshot().discarded, 1);
        assert!(outbound.try_recv().is_err());
    }

    // =============================================================================
    // CONCURRENCY
    // =============================================================================

    #[tokio::test]
    async fn test_out_of_order_answers_reach_their_callers() {
        let net = Topology::new();
        let output = net.csms.output().clone();

        let slow = {
            let output = output.clone();
            let request = net.to_device("1", "Delay", r#"{"ms":60}"#);
            tokio::spawn(async move { output.call(request).await })
        };
        let fast = {
            let request = net.to_device("2", "Delay", r#"{"ms":5}"#);
            tokio::spawn(async move { output.call(request).await })
        };

        let fast = fast.await.unwrap().unwrap();
        let slow = slow.await.unwrap().unwrap();

        assert_eq!(fast.correlation_id.as_str(), "2");
        assert_eq!(slept(&fast), Slept { slept: 5 });
        assert_eq!(slow.correlation_id.as_str(), "1");
        assert_eq!(slept(&slow), Slept { slept: 60 });
        assert_eq!(net.csms.pending().stats().snapshot().completed, 2);
    }

    // =============================================================================
    // MALFORMED INPUT
    // =============================================================================

    #[tokio::test]
    async fn test_malformed_frame_answered_with_formation_violation() {
        let net = Topology::new();
        let (connection, mut outbound) = net.csms.input().open_connection();

        net.csms
            .input()
            .handle_frame(connection, Frame::from(r#"[2,"x"]"#));

        let reply = parse(&outbound.recv().await.unwrap()).unwrap();
        let Envelope::RequestError(error) = reply else {
            panic!("expected a request error, got {reply:?}");
        };
        assert_eq!(error.correlation_id.as_str(), "x");
        assert_eq!(error.code, ErrorCode::FormationViolation);
    }

    #[tokio::test]
    async fn test_unreadable_frame_without_id_is_dropped() {
        let net = Topology::new();
        let (connection, mut outbound) = net.csms.input().open_connection();

        net.csms.input().handle_frame(connection, Frame::from("not json"));
        net.csms
            .input()
            .handle_frame(connection, Frame::from(r#"[2,"ok","Reset",{}]"#));

        // The only reply is to the well-formed request.
        let reply = parse(&outbound.recv().await.unwrap()).unwrap();
        assert_eq!(reply.correlation_id().as_str(), "ok");
        assert!(outbound.try_recv().is_err());
    }
}

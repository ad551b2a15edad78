//! WebSocket transport.
//!
//! Peers connect to `/{node_id}`; the path segment names the peer and
//! becomes its route. Text and binary messages are fed to the adapter's
//! read loop, and the connection's outbound queue is drained into the
//! socket by a writer task.
//!
//! Security features:
//! - Message size limit (default 1MB), enforced during the upgrade
//! - Node ids validated before the upgrade

use crate::domain::errors::AdapterError;
use crate::service::Adapter;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use fl_01_envelope::Frame;
use futures::{Sink, SinkExt, StreamExt};
use shared_types::{ConnectionId, NodeId};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Router serving the adapter's WebSocket endpoint.
pub fn router(adapter: Adapter) -> Router {
    Router::new()
        .route("/:node", get(upgrade))
        .with_state(adapter)
}

/// Bind the configured address and serve until the listener fails.
pub async fn serve(adapter: Adapter) -> Result<(), AdapterError> {
    let addr = adapter.websocket_config().addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, node = %adapter.local(), "Starting WebSocket server");
    axum::serve(listener, router(adapter)).await?;
    Ok(())
}

async fn upgrade(
    ws: WebSocketUpgrade,
    Path(node): Path<String>,
    State(adapter): State<Adapter>,
) -> Response {
    let peer = match NodeId::new(node) {
        Ok(peer) => peer,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };
    let max = adapter.websocket_config().max_message_size;
    ws.max_message_size(max)
        .on_upgrade(move |socket| handle_socket(adapter, peer, socket))
}

/// Drive one WebSocket connection until either side closes it.
async fn handle_socket(adapter: Adapter, peer: NodeId, socket: WebSocket) {
    let (connection, outbound) = adapter.input().open_connection();
    adapter.routes().add_route(peer.clone(), connection);
    info!(connection = %connection, peer = %peer, "New WebSocket connection");

    let (sink, mut stream) = socket.split();

    let writer = tokio::spawn(write_frames(connection, outbound, sink));

    let reason = loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                adapter.input().handle_frame(connection, Frame::Text(text));
            }
            Some(Ok(Message::Binary(data))) => {
                adapter.input().handle_frame(connection, Frame::from(data));
            }
            // Pings are answered by the socket itself.
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
            Some(Ok(Message::Close(_))) => {
                debug!(connection = %connection, "WebSocket close received");
                break "closed by peer";
            }
            Some(Err(e)) => {
                warn!(connection = %connection, error = %e, "WebSocket error");
                break "socket error";
            }
            None => break "socket ended",
        }
    };

    // Closing drops the outbound queue, which ends the writer.
    adapter.input().close_connection(connection, reason);
    if let Err(e) = writer.await {
        warn!(connection = %connection, error = %e, "WebSocket writer task failed");
    }
}

/// Drain a connection's outbound queue into the socket until the queue
/// closes or a write fails, then close the socket.
async fn write_frames<S>(connection: ConnectionId, mut outbound: mpsc::Receiver<Frame>, mut sink: S)
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    while let Some(frame) = outbound.recv().await {
        let message = match frame {
            Frame::Text(text) => Message::Text(text),
            Frame::Binary(bytes) => Message::Binary(bytes.to_vec()),
        };
        if let Err(e) = sink.send(message).await {
            error!(connection = %connection, error = %e, "Failed to write WebSocket frame");
            break;
        }
    }
    if let Err(e) = sink.close().await {
        debug!(connection = %connection, error = %e, "WebSocket close failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::{AdapterConfig, NodeConfig};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn adapter() -> Adapter {
        let config = AdapterConfig {
            node: NodeConfig {
                id: Some(NodeId::new("csms").unwrap()),
            },
            ..AdapterConfig::default()
        };
        Adapter::builder(config).build().unwrap()
    }

    #[tokio::test]
    async fn test_writer_maps_frames_and_closes() {
        let (queue, outbound) = mpsc::channel(4);
        let (sink, mut written) = futures::channel::mpsc::unbounded::<Message>();
        queue.send(Frame::from(r#"[2,"1","Heartbeat",{}]"#)).await.unwrap();
        queue.send(Frame::from(vec![1u8, 2, 3])).await.unwrap();
        drop(queue);

        write_frames(ConnectionId::new(), outbound, sink).await;

        assert!(matches!(
            written.next().await,
            Some(Message::Text(ref text)) if text == r#"[2,"1","Heartbeat",{}]"#
        ));
        assert!(matches!(
            written.next().await,
            Some(Message::Binary(ref bytes)) if bytes.as_slice() == [1u8, 2, 3]
        ));
        // Closed after the queue ran dry.
        assert!(written.next().await.is_none());
    }

    #[tokio::test]
    async fn test_writer_stops_on_broken_socket() {
        let (queue, outbound) = mpsc::channel(4);
        let (sink, written) = futures::channel::mpsc::unbounded::<Message>();
        drop(written);
        queue.send(Frame::from("[]")).await.unwrap();

        // Returns although the queue is still open.
        write_frames(ConnectionId::new(), outbound, sink).await;
        assert!(queue.is_closed());
    }

    #[tokio::test]
    async fn test_plain_http_request_is_not_upgraded() {
        let response = router(adapter())
            .oneshot(Request::get("/cp-1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }
}

//! Per-connection session: Axum socket binding and the inbound loop.
//!
//! The write half of an upgraded socket becomes the connection's
//! [`FrameSink`]; the read half is drained here until the peer
//! disconnects, at which point the manager's idempotent `close` runs
//! exactly once. Inbound traffic is only inspected for the connector
//! label; invocation dispatch belongs to the application receiver and
//! is not part of this layer.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use wirecast_core::message::{Command, MessageContext};

use super::manager::ConnectionManager;
use super::transport::{Connection, FrameKind, FrameSink, SinkError, WireFrame};

/// [`FrameSink`] over the write half of an upgraded Axum socket.
///
/// Each [`WireFrame`] maps to one complete WebSocket message. The
/// end-of-message marker is carried by the chunking convention itself: a
/// binary frame shorter than the configured chunk size (possibly empty)
/// terminates the logical message, so the receive side needs no
/// per-frame flag beyond frame length.
pub struct AxumFrameSink {
    sink: SplitSink<WebSocket, Message>,
}

impl AxumFrameSink {
    /// Wrap the write half of an upgraded socket.
    #[must_use]
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl FrameSink for AxumFrameSink {
    async fn send(&mut self, frame: WireFrame) -> Result<(), SinkError> {
        let message = match frame.kind {
            FrameKind::Text => {
                let text = String::from_utf8(frame.payload.to_vec())
                    .map_err(|e| SinkError(format!("non-UTF8 text frame: {e}")))?;
                Message::Text(text.into())
            }
            FrameKind::Binary => Message::Binary(frame.payload),
        };
        self.sink
            .send(message)
            .await
            .map_err(|e| SinkError(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        self.sink
            .close()
            .await
            .map_err(|e| SinkError(e.to_string()))
    }
}

/// Run a connection from upgrade to disconnect.
///
/// Splits the socket, registers the write half with the manager (which
/// sends the handshake), then drains inbound frames until the peer
/// closes, the transport errors, or the server shuts down. All exits
/// converge on the manager's idempotent `close`.
#[instrument(skip_all)]
pub async fn run_session(
    socket: WebSocket,
    manager: Arc<ConnectionManager>,
    cancel: CancellationToken,
) {
    let (ws_tx, mut ws_rx) = socket.split();
    let sink = Box::new(AxumFrameSink::new(ws_tx));

    let connection = match manager.connect(sink).await {
        Ok(connection) => connection,
        Err(err) => {
            warn!(error = %err, "handshake failed, dropping socket");
            return;
        }
    };
    let connection_id = connection.id.clone();
    info!(connection_id = %connection_id, "client connected");

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                debug!(connection_id = %connection_id, "server shutdown, ending session");
                break;
            }
            inbound = ws_rx.next() => {
                let Some(Ok(message)) = inbound else {
                    debug!(connection_id = %connection_id, "socket closed by peer");
                    break;
                };
                match message {
                    Message::Text(text) => handle_inbound_text(&connection, text.as_str()),
                    Message::Close(_) => {
                        debug!(connection_id = %connection_id, "close frame received");
                        break;
                    }
                    // Keep-alive belongs to the hosting runtime.
                    Message::Ping(_) | Message::Pong(_) => {}
                    Message::Binary(data) => {
                        debug!(
                            connection_id = %connection_id,
                            len = data.len(),
                            "ignoring inbound binary frame"
                        );
                    }
                }
            }
        }
    }

    info!(connection_id = %connection_id, "client disconnected");
    manager.close(&connection_id).await;
}

/// Inspect an inbound text context for the connector label.
///
/// A `connect` command with `value.connectorName` labels the connection
/// for the enumeration surface. Anything else is left to the
/// application receiver.
fn handle_inbound_text(connection: &Connection, text: &str) {
    let Ok(context) = serde_json::from_str::<MessageContext>(text) else {
        debug!(connection_id = %connection.id, "undecodable inbound text frame");
        return;
    };
    if context.command == Command::Custom("connect".to_owned()) {
        if let Some(name) = context.value.get("connectorName").and_then(Value::as_str) {
            connection.set_connector_name(name);
            debug!(connection_id = %connection.id, connector_name = name, "connector labeled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::testing::RecordingSink;
    use serde_json::json;
    use wirecast_core::ids::ConnectionId;

    fn make_connection() -> Connection {
        let (sink, _frames, _closed) = RecordingSink::new();
        Connection::new(ConnectionId::from("c1"), Box::new(sink))
    }

    #[test]
    fn connect_context_sets_connector_name() {
        let connection = make_connection();
        let text =
            serde_json::to_string(&MessageContext::new(
                Command::Custom("connect".into()),
                json!({"connectorName": "cache-node-1"}),
            ))
            .unwrap();
        handle_inbound_text(&connection, &text);
        assert_eq!(connection.connector_name().as_deref(), Some("cache-node-1"));
    }

    #[test]
    fn other_commands_leave_label_unset() {
        let connection = make_connection();
        let text = serde_json::to_string(&MessageContext::data_send(json!({
            "connectorName": "should-not-apply"
        })))
        .unwrap();
        handle_inbound_text(&connection, &text);
        assert!(connection.connector_name().is_none());
    }

    #[test]
    fn garbage_text_is_ignored() {
        let connection = make_connection();
        handle_inbound_text(&connection, "not json");
        assert!(connection.connector_name().is_none());
    }

    #[test]
    fn connect_without_name_is_ignored() {
        let connection = make_connection();
        let text = serde_json::to_string(&MessageContext::new(
            Command::Custom("connect".into()),
            json!({"other": 1}),
        ))
        .unwrap();
        handle_inbound_text(&connection, &text);
        assert!(connection.connector_name().is_none());
    }

    // Session loop behavior over a real socket is covered by
    // tests/integration.rs.
}

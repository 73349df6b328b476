//! Connection transport: one live socket behind a per-connection send
//! lock.
//!
//! [`Connection`] owns its socket exclusively through the [`FrameSink`]
//! seam. All sends for a connection are serialized through a
//! `tokio::sync::Mutex` held for the duration of a logical message (one
//! text frame, or an entire chunk stream), which gives the per-connection
//! FIFO ordering the chunk reconstruction depends on and prevents two
//! callers from interleaving chunked sends to the same peer.

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;

use async_trait::async_trait;
use wirecast_core::ids::ConnectionId;

/// Kind of a wire frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    /// UTF-8 text frame.
    Text,
    /// Binary frame.
    Binary,
}

/// One outbound WebSocket frame with its end-of-message marker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WireFrame {
    /// Text or binary.
    pub kind: FrameKind,
    /// Frame payload. `Bytes` so a broadcast can share one buffer
    /// across connections without copying.
    pub payload: Bytes,
    /// Whether this frame completes the logical message.
    pub end_of_message: bool,
}

impl WireFrame {
    /// A complete text frame; text messages are never chunked.
    #[must_use]
    pub fn text(text: String) -> Self {
        Self {
            kind: FrameKind::Text,
            payload: Bytes::from(text.into_bytes()),
            end_of_message: true,
        }
    }

    /// A binary chunk frame.
    #[must_use]
    pub fn binary(payload: Bytes, end_of_message: bool) -> Self {
        Self {
            kind: FrameKind::Binary,
            payload,
            end_of_message,
        }
    }
}

/// Transport write failure. Callers treat it as connection death.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct SinkError(pub String);

/// The raw socket seam: an exclusively owned, ordered, reliable frame
/// writer.
///
/// The Axum-backed implementation lives in the session module; tests
/// substitute recording or failing doubles.
#[async_trait]
pub trait FrameSink: Send {
    /// Write one frame. Frames sent through a single sink arrive in
    /// send order.
    async fn send(&mut self, frame: WireFrame) -> Result<(), SinkError>;

    /// Close the underlying socket. Best-effort; the sink is unusable
    /// afterwards.
    async fn close(&mut self) -> Result<(), SinkError>;
}

/// One active WebSocket session.
pub struct Connection {
    /// Registry key, generated at connect time, immutable.
    pub id: ConnectionId,
    /// Optional client-supplied label, set by the receive path.
    connector_name: parking_lot::Mutex<Option<String>>,
    /// Exclusively owned socket; the mutex is the per-connection send
    /// lock.
    sink: Mutex<Box<dyn FrameSink>>,
}

impl Connection {
    /// Wrap a sink under a connection id.
    #[must_use]
    pub fn new(id: ConnectionId, sink: Box<dyn FrameSink>) -> Self {
        Self {
            id,
            connector_name: parking_lot::Mutex::new(None),
            sink: Mutex::new(sink),
        }
    }

    /// The client-supplied label, if one has arrived.
    #[must_use]
    pub fn connector_name(&self) -> Option<String> {
        self.connector_name.lock().clone()
    }

    /// Record the client-supplied label.
    pub fn set_connector_name(&self, name: impl Into<String>) {
        *self.connector_name.lock() = Some(name.into());
    }

    /// Send a single frame, holding the send lock for its duration.
    pub async fn send_frame(&self, frame: WireFrame) -> Result<(), SinkError> {
        let mut sink = self.sink.lock().await;
        sink.send(frame).await
    }

    /// Send a whole logical message, holding the send lock across every
    /// frame so no other caller can interleave.
    ///
    /// Stops at the first transport error, or after the frame flagged
    /// end-of-message.
    pub async fn send_frames(
        &self,
        frames: impl IntoIterator<Item = WireFrame> + Send,
    ) -> Result<(), SinkError> {
        let mut sink = self.sink.lock().await;
        for frame in frames {
            let last = frame.end_of_message;
            sink.send(frame).await?;
            if last {
                break;
            }
        }
        Ok(())
    }

    /// Close the socket. Errors are swallowed: the connection is being
    /// discarded either way.
    pub async fn close(&self) {
        let mut sink = self.sink.lock().await;
        let _ = sink.close().await;
    }

    /// Enumeration row for this connection.
    #[must_use]
    pub fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            connection_id: self.id.as_str().to_owned(),
            connector_name: self.connector_name(),
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("connector_name", &self.connector_name())
            .finish_non_exhaustive()
    }
}

/// Row in the connection enumeration surface.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    /// Registry key of the connection.
    pub connection_id: String,
    /// Optional client-supplied label.
    pub connector_name: Option<String>,
}

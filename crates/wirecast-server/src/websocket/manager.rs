//! Connection manager: the orchestrator for connect, send, broadcast,
//! and close.
//!
//! Composes the registry, codec, compressor, and handshake provider.
//! Text contexts go out as one complete frame; binary payloads take the
//! envelope pipeline (serialize properties, splitter, compress) and are
//! chunked at the configured size. A transport failure on any path is
//! treated as connection death: the connection is evicted and its
//! socket released.

use std::sync::Arc;

use bytes::Bytes;
use metrics::{counter, gauge};
use tracing::{debug, info, warn};

use wirecast_codec::compress::Compressor;
use wirecast_codec::envelope::encode_envelope;
use wirecast_codec::{chunks, encode_text_context};
use wirecast_core::errors::{Result, WirecastError};
use wirecast_core::ids::ConnectionId;
use wirecast_core::message::{MessageContext, PropertyMap};

use crate::handshake::HandshakeStateProvider;

use super::registry::ConnectionRegistry;
use super::transport::{Connection, ConnectionInfo, FrameSink, SinkError, WireFrame};

/// Orchestrates connection lifecycle and outbound delivery.
pub struct ConnectionManager {
    registry: Arc<ConnectionRegistry>,
    compressor: Arc<dyn Compressor>,
    handshake: Arc<dyn HandshakeStateProvider>,
    chunk_size: usize,
}

impl ConnectionManager {
    /// Create a manager owning a fresh registry.
    ///
    /// `chunk_size` must be positive; the configuration surface
    /// validates it before construction.
    #[must_use]
    pub fn new(
        compressor: Arc<dyn Compressor>,
        handshake: Arc<dyn HandshakeStateProvider>,
        chunk_size: usize,
    ) -> Self {
        Self::with_registry(
            Arc::new(ConnectionRegistry::new()),
            compressor,
            handshake,
            chunk_size,
        )
    }

    /// Create a manager over an injected registry (test doubles, shared
    /// ownership).
    #[must_use]
    pub fn with_registry(
        registry: Arc<ConnectionRegistry>,
        compressor: Arc<dyn Compressor>,
        handshake: Arc<dyn HandshakeStateProvider>,
        chunk_size: usize,
    ) -> Self {
        Self {
            registry,
            compressor,
            handshake,
            chunk_size,
        }
    }

    /// The underlying registry handle.
    #[must_use]
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Configured chunk size for binary transfer.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Register a fresh connection and send its handshake.
    ///
    /// Wraps the sink in a [`Connection`] under a generated id, inserts
    /// it (insertion never fails), and immediately delivers the
    /// handshake context (`command = handshake`, `value` = the id,
    /// `state` from the provider). The caller then drives the inbound
    /// receiver loop for the connection.
    ///
    /// A transport failure during the handshake evicts the connection
    /// again and propagates.
    pub async fn connect(&self, sink: Box<dyn FrameSink>) -> Result<Arc<Connection>> {
        let connection = Arc::new(Connection::new(ConnectionId::new(), sink));
        self.registry.insert(connection.clone()).await;

        counter!("ws_connections_total").increment(1);
        gauge!("ws_connections_active").increment(1.0);
        info!(connection_id = %connection.id, "connection registered");

        let state = self.handshake.state().await;
        let context = MessageContext::handshake(&connection.id, state);
        let frame = match encode_text_context(&context) {
            Ok(text) => WireFrame::text(text),
            Err(err) => {
                // No entry may survive a failed handshake window.
                self.close(&connection.id).await;
                return Err(err);
            }
        };
        self.deliver(&connection, vec![frame]).await?;

        Ok(connection)
    }

    /// Send a text context to one connection as a single complete
    /// frame.
    ///
    /// Validation failures (`context.value` null) surface immediately;
    /// an empty registry is a no-op fast path; a missing id is
    /// `NotFound`; a transport failure evicts the connection and
    /// propagates.
    pub async fn send(&self, id: &ConnectionId, context: &MessageContext) -> Result<()> {
        context.validate()?;
        if self.registry.is_empty().await {
            return Ok(());
        }
        let connection = self.registry.get(id).await?;
        let frame = WireFrame::text(encode_text_context(context)?);
        self.deliver(&connection, vec![frame]).await
    }

    /// Send a text context to every connection in a registry snapshot.
    ///
    /// The frame is encoded once and shared. Per-connection transport
    /// failures are isolated: the failing connection is evicted and
    /// delivery continues to the rest.
    pub async fn broadcast(&self, context: &MessageContext) -> Result<()> {
        context.validate()?;
        let snapshot = self.registry.snapshot().await;
        if snapshot.is_empty() {
            return Ok(());
        }
        let frame = WireFrame::text(encode_text_context(context)?);
        debug!(recipients = snapshot.len(), command = %context.command, "broadcast text");
        counter!("ws_broadcasts_total").increment(1);
        for connection in snapshot {
            let _ = self.deliver(&connection, vec![frame.clone()]).await;
        }
        Ok(())
    }

    /// Send a binary payload to one connection through the chunked
    /// envelope pipeline.
    ///
    /// Chunks go out in order with the final one flagged end-of-message;
    /// the per-connection send lock is held across the whole stream.
    pub async fn send_binary(
        &self,
        id: &ConnectionId,
        payload: &[u8],
        properties: &PropertyMap,
    ) -> Result<()> {
        if self.registry.is_empty().await {
            return Ok(());
        }
        let connection = self.registry.get(id).await?;
        let frames = self.binary_frames(payload, properties).await?;
        self.deliver(&connection, frames).await
    }

    /// Send a binary payload to every connection in a registry
    /// snapshot.
    ///
    /// The envelope is encoded and chunked once; the identical immutable
    /// chunk sequence is replayed connection by connection. One
    /// connection's failure does not abort delivery to the others.
    pub async fn broadcast_binary(&self, payload: &[u8], properties: &PropertyMap) -> Result<()> {
        let snapshot = self.registry.snapshot().await;
        if snapshot.is_empty() {
            return Ok(());
        }
        let frames = self.binary_frames(payload, properties).await?;
        debug!(
            recipients = snapshot.len(),
            frames = frames.len(),
            "broadcast binary"
        );
        counter!("ws_broadcasts_total").increment(1);
        for connection in snapshot {
            let _ = self.deliver(&connection, frames.clone()).await;
        }
        Ok(())
    }

    /// Remove a connection and release its socket. Idempotent: closing
    /// an unknown or already-closed id is a no-op.
    ///
    /// Both the management path and the receiver's disconnect callback
    /// converge here.
    pub async fn close(&self, id: &ConnectionId) {
        if let Some(connection) = self.registry.remove(id).await {
            connection.close().await;
            counter!("ws_disconnections_total").increment(1);
            gauge!("ws_connections_active").decrement(1.0);
            info!(connection_id = %id, "connection closed");
        }
    }

    /// Enumeration rows for every live connection.
    pub async fn connections(&self) -> Vec<ConnectionInfo> {
        self.registry.infos().await
    }

    /// Number of live connections.
    pub async fn connection_count(&self) -> usize {
        self.registry.len().await
    }

    /// Encode and chunk a binary payload into its frame sequence.
    async fn binary_frames(
        &self,
        payload: &[u8],
        properties: &PropertyMap,
    ) -> Result<Vec<WireFrame>> {
        let envelope = encode_envelope(payload, properties, self.compressor.as_ref()).await?;
        Ok(chunks(&envelope, self.chunk_size)
            .map(|(slice, last)| WireFrame::binary(Bytes::copy_from_slice(slice), last))
            .collect())
    }

    /// Write a logical message to one connection, evicting it on
    /// transport failure.
    async fn deliver(&self, connection: &Arc<Connection>, frames: Vec<WireFrame>) -> Result<()> {
        match connection.send_frames(frames).await {
            Ok(()) => Ok(()),
            Err(SinkError(message)) => {
                warn!(
                    connection_id = %connection.id,
                    error = %message,
                    "send failed, evicting connection"
                );
                self.close(&connection.id).await;
                Err(WirecastError::transport(connection.id.clone(), message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::{Value, json};

    use crate::handshake::StaticHandshakeState;
    use crate::websocket::testing::{FailingSink, RecordingSink};
    use crate::websocket::transport::FrameKind;
    use wirecast_codec::compress::{DeflateCompressor, NoopCompressor};
    use wirecast_codec::envelope::decode_envelope;
    use wirecast_core::message::Command;

    type FrameLog = Arc<Mutex<Vec<WireFrame>>>;

    const CHUNK: usize = 4;

    fn make_manager(chunk_size: usize) -> ConnectionManager {
        ConnectionManager::new(
            Arc::new(DeflateCompressor::new()),
            Arc::new(StaticHandshakeState::new(json!({"epoch": 1}))),
            chunk_size,
        )
    }

    async fn connect_recording(manager: &ConnectionManager) -> (ConnectionId, FrameLog) {
        let (sink, frames, _closed) = RecordingSink::new();
        let connection = manager.connect(Box::new(sink)).await.unwrap();
        (connection.id.clone(), frames)
    }

    fn props(pairs: &[(&str, Value)]) -> PropertyMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect()
    }

    /// Reassemble a recorded chunk stream (everything after the
    /// handshake frame) back into the original envelope.
    fn reassemble(frames: &[WireFrame]) -> Vec<u8> {
        let mut envelope = Vec::new();
        for frame in frames {
            assert_eq!(frame.kind, FrameKind::Binary);
            envelope.extend_from_slice(&frame.payload);
            if frame.end_of_message {
                break;
            }
        }
        envelope
    }

    #[tokio::test]
    async fn connect_registers_and_sends_handshake() {
        let manager = make_manager(CHUNK);
        let (id, frames) = connect_recording(&manager).await;

        assert_eq!(manager.connection_count().await, 1);

        let sent = frames.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, FrameKind::Text);
        assert!(sent[0].end_of_message);

        let ctx: MessageContext =
            serde_json::from_slice(&sent[0].payload).unwrap();
        assert_eq!(ctx.command, Command::Handshake);
        assert_eq!(ctx.value, json!(id.as_str()));
        assert_eq!(ctx.state, Some(json!({"epoch": 1})));
    }

    #[tokio::test]
    async fn connect_generates_unique_ids() {
        let manager = make_manager(CHUNK);
        let (id1, _f1) = connect_recording(&manager).await;
        let (id2, _f2) = connect_recording(&manager).await;
        assert_ne!(id1, id2);
        assert_eq!(manager.connection_count().await, 2);
    }

    #[tokio::test]
    async fn connect_with_dead_sink_evicts_and_errors() {
        let manager = make_manager(CHUNK);
        let result = manager.connect(Box::new(FailingSink::new(0))).await;
        assert!(matches!(result, Err(WirecastError::Transport { .. })));
        assert_eq!(manager.connection_count().await, 0);
    }

    #[tokio::test]
    async fn send_delivers_one_text_frame() {
        let manager = make_manager(CHUNK);
        let (id, frames) = connect_recording(&manager).await;

        let ctx = MessageContext::data_send(json!({"message": "hi"}));
        manager.send(&id, &ctx).await.unwrap();

        let sent = frames.lock();
        assert_eq!(sent.len(), 2); // handshake + data
        let back: MessageContext = serde_json::from_slice(&sent[1].payload).unwrap();
        assert_eq!(back, ctx);
    }

    #[tokio::test]
    async fn send_on_empty_registry_is_noop() {
        let manager = make_manager(CHUNK);
        let ctx = MessageContext::data_send(json!("x"));
        manager
            .send(&ConnectionId::from("ghost"), &ctx)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn send_to_missing_id_is_not_found() {
        let manager = make_manager(CHUNK);
        let (_id, _frames) = connect_recording(&manager).await;

        let ctx = MessageContext::data_send(json!("x"));
        let err = manager
            .send(&ConnectionId::from("ghost"), &ctx)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn send_null_value_is_invalid_argument() {
        let manager = make_manager(CHUNK);
        let (id, _frames) = connect_recording(&manager).await;

        let ctx = MessageContext::new(Command::DataSend, Value::Null);
        let err = manager.send(&id, &ctx).await.unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[tokio::test]
    async fn send_transport_failure_evicts_connection() {
        let manager = make_manager(CHUNK);
        // Allow the handshake frame, fail afterwards.
        let connection = manager.connect(Box::new(FailingSink::new(1))).await.unwrap();
        let id = connection.id.clone();

        let ctx = MessageContext::data_send(json!("x"));
        let err = manager.send(&id, &ctx).await.unwrap_err();
        assert!(matches!(err, WirecastError::Transport { .. }));

        // The dead connection is gone; a retry sees NotFound semantics
        // (here: empty registry fast path).
        assert_eq!(manager.connection_count().await, 0);
    }

    #[tokio::test]
    async fn broadcast_reaches_every_connection() {
        let manager = make_manager(CHUNK);
        let (_id1, frames1) = connect_recording(&manager).await;
        let (_id2, frames2) = connect_recording(&manager).await;

        let ctx = MessageContext::data_send(json!({"message": "all"}));
        manager.broadcast(&ctx).await.unwrap();

        for frames in [frames1, frames2] {
            let sent = frames.lock();
            assert_eq!(sent.len(), 2);
            let back: MessageContext = serde_json::from_slice(&sent[1].payload).unwrap();
            assert_eq!(back.value, json!({"message": "all"}));
        }
    }

    #[tokio::test]
    async fn broadcast_on_empty_registry_is_noop() {
        let manager = make_manager(CHUNK);
        let ctx = MessageContext::data_send(json!({"message": "hi"}));
        manager.broadcast(&ctx).await.unwrap();
    }

    #[tokio::test]
    async fn broadcast_null_value_is_invalid_argument() {
        let manager = make_manager(CHUNK);
        let ctx = MessageContext::new(Command::DataSend, Value::Null);
        assert!(manager.broadcast(&ctx).await.unwrap_err().is_invalid_argument());
    }

    #[tokio::test]
    async fn broadcast_isolates_per_connection_failure() {
        let manager = make_manager(CHUNK);
        let (_good1, frames1) = connect_recording(&manager).await;
        // Handshake succeeds, everything after fails.
        let dead = manager.connect(Box::new(FailingSink::new(1))).await.unwrap();
        let dead_id = dead.id.clone();
        let (_good2, frames2) = connect_recording(&manager).await;

        let ctx = MessageContext::data_send(json!({"message": "still delivered"}));
        manager.broadcast(&ctx).await.unwrap();

        // Both healthy connections got the message.
        assert_eq!(frames1.lock().len(), 2);
        assert_eq!(frames2.lock().len(), 2);
        // The dead connection was evicted.
        assert!(
            manager
                .registry()
                .get(&dead_id)
                .await
                .unwrap_err()
                .is_not_found()
        );
        assert_eq!(manager.connection_count().await, 2);
    }

    #[tokio::test]
    async fn send_binary_roundtrips_through_chunks() {
        let compressor = DeflateCompressor::new();
        let manager = make_manager(CHUNK);
        let (id, frames) = connect_recording(&manager).await;

        let properties = props(&[("key", json!("cache-7"))]);
        let payload = b"a binary payload that spans several chunks";
        manager.send_binary(&id, payload, &properties).await.unwrap();

        let sent = frames.lock();
        let chunk_frames = &sent[1..];
        assert!(chunk_frames.len() > 1);
        // Exactly one end-of-message frame, and it is the final one.
        assert_eq!(
            chunk_frames.iter().filter(|f| f.end_of_message).count(),
            1
        );
        assert!(chunk_frames.last().unwrap().end_of_message);
        // Every non-final chunk is exactly chunk_size bytes.
        for frame in &chunk_frames[..chunk_frames.len() - 1] {
            assert_eq!(frame.payload.len(), CHUNK);
        }

        let envelope = reassemble(chunk_frames);
        let (back_props, back_payload) =
            decode_envelope(&envelope, &compressor).await.unwrap();
        assert_eq!(back_props, properties);
        assert_eq!(back_payload, payload);
    }

    #[tokio::test]
    async fn send_binary_exact_multiple_ends_with_empty_chunk() {
        // Noop compressor gives exact control over the envelope length:
        // {} + splitter + payload. Pad the payload so the envelope is a
        // multiple of the chunk size.
        let manager = ConnectionManager::new(
            Arc::new(NoopCompressor),
            Arc::new(StaticHandshakeState::default()),
            CHUNK,
        );
        let (id, frames) = connect_recording(&manager).await;

        let properties = PropertyMap::new(); // serializes to "{}"
        let envelope_len = 2 + 1; // "{}" + splitter
        let pad = CHUNK - (envelope_len % CHUNK);
        let payload = vec![0xAB; pad + CHUNK]; // envelope = 2 * CHUNK
        manager.send_binary(&id, &payload, &properties).await.unwrap();

        let sent = frames.lock();
        let chunk_frames = &sent[1..];
        assert_eq!(chunk_frames.len(), 3);
        assert!(chunk_frames[2].payload.is_empty());
        assert!(chunk_frames[2].end_of_message);
        assert!(!chunk_frames[0].end_of_message);
        assert!(!chunk_frames[1].end_of_message);
    }

    #[tokio::test]
    async fn send_binary_on_empty_registry_is_noop() {
        let manager = make_manager(CHUNK);
        manager
            .send_binary(&ConnectionId::from("ghost"), b"x", &PropertyMap::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn send_binary_to_missing_id_is_not_found() {
        let manager = make_manager(CHUNK);
        let (_id, _frames) = connect_recording(&manager).await;
        let err = manager
            .send_binary(&ConnectionId::from("ghost"), b"x", &PropertyMap::new())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn broadcast_binary_replays_identical_chunks() {
        let compressor = DeflateCompressor::new();
        let manager = make_manager(CHUNK);
        let (_id1, frames1) = connect_recording(&manager).await;
        let (_id2, frames2) = connect_recording(&manager).await;

        let properties = props(&[("key", json!("v"))]);
        let payload = b"broadcast me everywhere";
        manager.broadcast_binary(payload, &properties).await.unwrap();

        let sent1 = frames1.lock();
        let sent2 = frames2.lock();
        assert_eq!(&sent1[1..], &sent2[1..]);

        let envelope = reassemble(&sent1[1..]);
        let (back_props, back_payload) =
            decode_envelope(&envelope, &compressor).await.unwrap();
        assert_eq!(back_props, properties);
        assert_eq!(back_payload, payload);
    }

    #[tokio::test]
    async fn broadcast_binary_on_empty_registry_is_noop() {
        let manager = make_manager(CHUNK);
        manager
            .broadcast_binary(b"x", &PropertyMap::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn broadcast_binary_isolates_failures() {
        let manager = make_manager(CHUNK);
        let dead = manager.connect(Box::new(FailingSink::new(1))).await.unwrap();
        let dead_id = dead.id.clone();
        let (_good, frames) = connect_recording(&manager).await;

        manager
            .broadcast_binary(b"payload", &props(&[("k", json!(1))]))
            .await
            .unwrap();

        // Healthy connection received the full chunk stream.
        let sent = frames.lock();
        assert!(sent.len() > 1);
        assert!(sent.last().unwrap().end_of_message);
        // Dead connection evicted.
        assert!(
            manager
                .registry()
                .get(&dead_id)
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn close_releases_socket_and_is_idempotent() {
        let manager = make_manager(CHUNK);
        let (sink, _frames, closed) = RecordingSink::new();
        let connection = manager.connect(Box::new(sink)).await.unwrap();
        let id = connection.id.clone();

        manager.close(&id).await;
        assert!(closed.load(std::sync::atomic::Ordering::SeqCst));
        assert_eq!(manager.connection_count().await, 0);

        // Second close: no error, no effect.
        manager.close(&id).await;
        assert_eq!(manager.connection_count().await, 0);
    }

    #[tokio::test]
    async fn closed_id_is_invalid_for_all_further_operations() {
        let manager = make_manager(CHUNK);
        let (id, _frames) = connect_recording(&manager).await;
        let (_other, _frames2) = connect_recording(&manager).await;
        manager.close(&id).await;

        let ctx = MessageContext::data_send(json!("x"));
        assert!(manager.send(&id, &ctx).await.unwrap_err().is_not_found());
        assert!(
            manager
                .send_binary(&id, b"x", &PropertyMap::new())
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn connections_enumeration_includes_labels() {
        let manager = make_manager(CHUNK);
        let (sink, _frames, _closed) = RecordingSink::new();
        let connection = manager.connect(Box::new(sink)).await.unwrap();
        connection.set_connector_name("cache-node");

        let infos = manager.connections().await;
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].connector_name.as_deref(), Some("cache-node"));
    }

    #[tokio::test]
    async fn concurrent_connect_and_close_keep_registry_consistent() {
        let manager = Arc::new(make_manager(CHUNK));
        let mut handles = Vec::new();
        for _ in 0..16 {
            let manager = manager.clone();
            handles.push(tokio::spawn(async move {
                let (sink, _frames, _closed) = RecordingSink::new();
                let connection = manager.connect(Box::new(sink)).await.unwrap();
                manager.close(&connection.id).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(manager.connection_count().await, 0);
    }
}

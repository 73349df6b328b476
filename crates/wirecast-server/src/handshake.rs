//! Handshake state capability.
//!
//! Every freshly registered connection receives a handshake message
//! carrying its assigned id plus whatever application state the host
//! wants new peers to start from. The provider is injected at manager
//! construction and queried once per connect.

use async_trait::async_trait;
use serde_json::Value;

/// Capability to produce the current server-side handshake state.
///
/// Side-effect free from the manager's perspective; the returned value
/// is embedded verbatim in the handshake context's `state` field.
#[async_trait]
pub trait HandshakeStateProvider: Send + Sync {
    /// Current application state handed to a newly connected peer.
    async fn state(&self) -> Value;
}

/// Provider returning a fixed value on every call.
#[derive(Clone, Debug, Default)]
pub struct StaticHandshakeState {
    state: Value,
}

impl StaticHandshakeState {
    /// Create a provider that always returns `state`.
    #[must_use]
    pub fn new(state: Value) -> Self {
        Self { state }
    }
}

#[async_trait]
impl HandshakeStateProvider for StaticHandshakeState {
    async fn state(&self) -> Value {
        self.state.clone()
    }
}

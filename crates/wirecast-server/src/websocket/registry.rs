//! Concurrent connection registry.
//!
//! Process-wide mapping from connection id to live transport. Insertion
//! and removal are atomic with respect to concurrent readers, and
//! [`ConnectionRegistry::snapshot`] yields a consistent point-in-time
//! view for broadcast iteration. No entry survives removal; there is no
//! soft-delete state.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use wirecast_core::errors::{Result, WirecastError};
use wirecast_core::ids::ConnectionId;

use super::transport::{Connection, ConnectionInfo};

/// Connections indexed by connection id.
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, Arc<Connection>>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Insert a newly created connection under its id. Never fails;
    /// ids are freshly generated so at most one live entry per id
    /// exists.
    pub async fn insert(&self, connection: Arc<Connection>) {
        let mut conns = self.connections.write().await;
        let _ = conns.insert(connection.id.clone(), connection);
    }

    /// Look up a live connection.
    pub async fn get(&self, id: &ConnectionId) -> Result<Arc<Connection>> {
        let conns = self.connections.read().await;
        conns
            .get(id)
            .cloned()
            .ok_or_else(|| WirecastError::NotFound(id.clone()))
    }

    /// Remove a connection, returning it so the caller can release the
    /// socket. Idempotent: removing an absent id is a no-op.
    pub async fn remove(&self, id: &ConnectionId) -> Option<Arc<Connection>> {
        let mut conns = self.connections.write().await;
        conns.remove(id)
    }

    /// Point-in-time view of all live connections for iteration.
    ///
    /// Connections added after the snapshot is taken are not included;
    /// a connection removed during iteration may still appear, and a
    /// send against it is allowed to fail without affecting the rest.
    pub async fn snapshot(&self) -> Vec<Arc<Connection>> {
        let conns = self.connections.read().await;
        conns.values().cloned().collect()
    }

    /// Number of live connections.
    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Whether the registry currently holds no connections.
    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }

    /// Enumeration rows for every live connection.
    pub async fn infos(&self) -> Vec<ConnectionInfo> {
        let conns = self.connections.read().await;
        conns.values().map(|c| c.info()).collect()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

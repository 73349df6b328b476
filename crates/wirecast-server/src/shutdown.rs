//! Graceful shutdown coordination via `CancellationToken`.

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::websocket::manager::ConnectionManager;

/// Coordinates graceful shutdown across server tasks.
///
/// Session loops hold a child view of the token and exit when it is
/// cancelled; [`ShutdownCoordinator::drain`] additionally closes every
/// registered connection so their sockets are released promptly.
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Get a clone of the cancellation token.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Initiate shutdown.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether a shutdown has been initiated.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel all tasks and close every registered connection.
    pub async fn drain(&self, manager: &ConnectionManager) {
        self.shutdown();
        let connections = manager.connections().await;
        info!(count = connections.len(), "draining connections");
        for info in connections {
            manager.close(&info.connection_id.into()).await;
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

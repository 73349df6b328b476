//! `WirecastServer`: Axum HTTP + WebSocket server wiring.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::{State, WebSocketUpgrade};
use axum::response::{Json, Response};
use axum::routing::get;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use wirecast_codec::compress::Compressor;

use crate::config::ServerConfig;
use crate::handshake::HandshakeStateProvider;
use crate::health::{self, HealthResponse};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::manager::ConnectionManager;
use crate::websocket::session;
use crate::websocket::transport::ConnectionInfo;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Connection manager for lifecycle and delivery.
    pub manager: Arc<ConnectionManager>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Server configuration.
    pub config: ServerConfig,
    /// When the server started.
    pub start_time: Instant,
}

/// The wirecast server.
pub struct WirecastServer {
    config: ServerConfig,
    manager: Arc<ConnectionManager>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
}

impl WirecastServer {
    /// Create a server from its injected capabilities.
    #[must_use]
    pub fn new(
        config: ServerConfig,
        compressor: Arc<dyn Compressor>,
        handshake: Arc<dyn HandshakeStateProvider>,
    ) -> Self {
        let manager = Arc::new(ConnectionManager::new(
            compressor,
            handshake,
            config.chunk_size,
        ));
        Self {
            config,
            manager,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            manager: self.manager.clone(),
            shutdown: self.shutdown.clone(),
            config: self.config.clone(),
            start_time: self.start_time,
        };

        Router::new()
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/connections", get(connections_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Bind and serve until shutdown. Returns the bound address (port 0
    /// auto-assigns) and the serve task handle.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener =
            tokio::net::TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        let addr = listener.local_addr()?;
        let app = self.router();
        let token = self.shutdown.token();

        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(token.cancelled_owned())
                .await;
        });

        info!(%addr, "listening");
        Ok((addr, handle))
    }

    /// Get the connection manager.
    #[must_use]
    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    /// Get the shutdown coordinator.
    #[must_use]
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /ws: upgrade and hand the socket to a session.
async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let manager = state.manager.clone();
    let token = state.shutdown.token();
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| session::run_session(socket, manager, token))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.manager.connection_count().await;
    Json(health::health_check(state.start_time, connections))
}

/// GET /connections: enumeration of live connections.
async fn connections_handler(State(state): State<AppState>) -> Json<Vec<ConnectionInfo>> {
    Json(state.manager.connections().await)
}

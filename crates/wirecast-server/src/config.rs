//! Server configuration.
//!
//! [`ServerConfig`] carries the knobs the core recognizes; everything
//! transport-level beyond these (TLS, keep-alive) belongs to the hosting
//! runtime. Values load from compiled defaults, an optional JSON file,
//! and `WIRECAST_`-prefixed environment variables, in that order.

use std::path::Path;

use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized};
use serde::{Deserialize, Serialize};

use wirecast_core::constants::DEFAULT_CHUNK_SIZE;
use wirecast_core::errors::{Result, WirecastError};

/// Configuration for the wirecast server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Fixed chunk size in bytes for binary transfer; must be positive.
    pub chunk_size: usize,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_message_size: 16 * 1024 * 1024, // 16 MB
        }
    }
}

impl ServerConfig {
    /// Check invariants the rest of the server relies on.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(WirecastError::invalid_argument(
                "chunk_size must be positive",
            ));
        }
        if self.max_message_size == 0 {
            return Err(WirecastError::invalid_argument(
                "max_message_size must be positive",
            ));
        }
        Ok(())
    }
}

/// Load configuration from defaults, an optional JSON file, and
/// `WIRECAST_`-prefixed environment variables (highest priority).
pub fn load_config(path: Option<&Path>) -> Result<ServerConfig> {
    let mut figment = Figment::from(Serialized::defaults(ServerConfig::default()));
    if let Some(path) = path {
        figment = figment.merge(Json::file(path));
    }
    let config: ServerConfig = figment
        .merge(Env::prefixed("WIRECAST_"))
        .extract()
        .map_err(|e| WirecastError::invalid_argument(format!("config: {e}")))?;
    config.validate()?;
    Ok(config)
}

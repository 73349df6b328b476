//! Error taxonomy for the registry, manager, and codec.
//!
//! Three caller-visible failure kinds, per the protocol contract:
//!
//! - [`WirecastError::InvalidArgument`]: a local precondition failure
//!   (missing context value, zero chunk size); surfaced synchronously,
//!   never retried
//! - [`WirecastError::NotFound`]: the target connection id has no live
//!   registry entry (never existed, or already closed)
//! - [`WirecastError::Transport`]: the socket write failed; the
//!   connection is treated as dead and evicted from the registry
//!
//! Codec failures ([`CodecError`]) are fatal for the encode that raised
//! them and propagate through [`WirecastError::Codec`].

use thiserror::Error;

use crate::ids::ConnectionId;

/// Convenience alias used across the wirecast crates.
pub type Result<T> = std::result::Result<T, WirecastError>;

/// Top-level error type for connection and messaging operations.
#[derive(Debug, Error)]
pub enum WirecastError {
    /// A required input was missing or empty.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No live registry entry exists for the target connection id.
    #[error("connection {0} not found")]
    NotFound(ConnectionId),

    /// The underlying socket write failed; the connection is dead.
    #[error("transport failure on connection {connection_id}: {message}")]
    Transport {
        /// Connection the write was addressed to.
        connection_id: ConnectionId,
        /// Transport-reported failure description.
        message: String,
    },

    /// Envelope or context encoding failed.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl WirecastError {
    /// Build an [`WirecastError::InvalidArgument`] from any message.
    #[must_use]
    pub fn invalid_argument(what: impl Into<String>) -> Self {
        Self::InvalidArgument(what.into())
    }

    /// Build a [`WirecastError::Transport`] for a dead connection.
    #[must_use]
    pub fn transport(connection_id: ConnectionId, message: impl Into<String>) -> Self {
        Self::Transport {
            connection_id,
            message: message.into(),
        }
    }

    /// Whether this error is a local precondition failure.
    #[must_use]
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }

    /// Whether this error means the target connection no longer exists.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Failures while building or unpacking a wire envelope.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The property map or message context could not be serialized.
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The compressor rejected the envelope.
    #[error("compression failed: {0}")]
    Compress(std::io::Error),

    /// The decompressor rejected the received bytes.
    #[error("decompression failed: {0}")]
    Decompress(std::io::Error),

    /// A decoded envelope did not contain the property splitter.
    #[error("envelope splitter not found")]
    MissingSplitter,

    /// The decoded properties segment was not a valid JSON object.
    #[error("invalid properties segment: {0}")]
    InvalidProperties(serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_argument_display() {
        let err = WirecastError::invalid_argument("context.value must not be null");
        assert_eq!(
            err.to_string(),
            "invalid argument: context.value must not be null"
        );
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn not_found_carries_the_id() {
        let err = WirecastError::NotFound(ConnectionId::from("conn-9"));
        assert_eq!(err.to_string(), "connection conn-9 not found");
        assert!(err.is_not_found());
    }

    #[test]
    fn transport_display() {
        let err = WirecastError::transport(ConnectionId::from("conn-1"), "broken pipe");
        assert!(err.to_string().contains("conn-1"));
        assert!(err.to_string().contains("broken pipe"));
        assert!(!err.is_not_found());
    }

    #[test]
    fn codec_error_wraps_into_wirecast_error() {
        let bad = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = WirecastError::from(CodecError::Serialize(bad));
        assert!(err.to_string().contains("serialization failed"));
    }

    #[test]
    fn missing_splitter_display() {
        let err = CodecError::MissingSplitter;
        assert_eq!(err.to_string(), "envelope splitter not found");
    }

    #[test]
    fn errors_are_std_error() {
        let _: &dyn std::error::Error = &WirecastError::invalid_argument("x");
        let _: &dyn std::error::Error = &CodecError::MissingSplitter;
    }
}

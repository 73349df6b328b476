//! Structured text-message unit exchanged over a connection.
//!
//! A [`MessageContext`] is serialized to a single UTF-8 text frame,
//! always sent complete (no chunking). Binary payloads travel a
//! different path (the compressed, chunked envelope) and carry a
//! [`PropertyMap`] instead of a context.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{Result, WirecastError};
use crate::ids::ConnectionId;

/// Arbitrary key/value structure describing a binary payload
/// (routing hints, cache keys, and similar).
pub type PropertyMap = serde_json::Map<String, Value>;

/// Logical command carried by a text message context.
///
/// `Handshake` and `DataSend` are protocol-level; anything else is an
/// application command and round-trips through [`Command::Custom`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Command {
    /// First message sent to a newly registered connection.
    Handshake,
    /// Application data push.
    DataSend,
    /// Extension point for application commands.
    Custom(String),
}

impl From<String> for Command {
    fn from(s: String) -> Self {
        match s.as_str() {
            "handshake" => Self::Handshake,
            "dataSend" => Self::DataSend,
            _ => Self::Custom(s),
        }
    }
}

impl From<Command> for String {
    fn from(command: Command) -> Self {
        match command {
            Command::Handshake => "handshake".to_owned(),
            Command::DataSend => "dataSend".to_owned(),
            Command::Custom(s) => s,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handshake => f.write_str("handshake"),
            Self::DataSend => f.write_str("dataSend"),
            Self::Custom(s) => f.write_str(s),
        }
    }
}

/// A structured message sent as one complete text frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageContext {
    /// What the receiver should do with this message.
    pub command: Command,
    /// Structured payload; must not be `null` for send operations.
    pub value: Value,
    /// Server-side state snapshot, present on handshake messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Value>,
}

impl MessageContext {
    /// Create a context with a command and value.
    #[must_use]
    pub fn new(command: Command, value: Value) -> Self {
        Self {
            command,
            value,
            state: None,
        }
    }

    /// The handshake context delivered to a fresh connection: its
    /// assigned id plus the current server-side handshake state.
    #[must_use]
    pub fn handshake(connection_id: &ConnectionId, state: Value) -> Self {
        Self {
            command: Command::Handshake,
            value: Value::String(connection_id.as_str().to_owned()),
            state: Some(state),
        }
    }

    /// A data-push context.
    #[must_use]
    pub fn data_send(value: Value) -> Self {
        Self::new(Command::DataSend, value)
    }

    /// Check the send precondition: `value` must not be `null`.
    pub fn validate(&self) -> Result<()> {
        if self.value.is_null() {
            return Err(WirecastError::invalid_argument(
                "context.value must not be null",
            ));
        }
        Ok(())
    }
}

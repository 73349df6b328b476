//! # wirecast-core
//!
//! Shared vocabulary for the wirecast WebSocket framing protocol.
//!
//! - [`ConnectionId`]: branded identifier for a live socket connection
//! - [`WirecastError`]: error taxonomy shared by the codec and the
//!   connection manager
//! - [`MessageContext`] / [`Command`]: the structured text-message unit
//! - Protocol constants: the envelope [`SPLITTER`](constants::SPLITTER)
//!   and the default chunk size

#![deny(unsafe_code)]

pub mod constants;
pub mod errors;
pub mod ids;
pub mod message;

pub use constants::{DEFAULT_CHUNK_SIZE, SPLITTER};
pub use errors::{CodecError, Result, WirecastError};
pub use ids::ConnectionId;
pub use message::{Command, MessageContext, PropertyMap};

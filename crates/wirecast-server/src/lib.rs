//! # wirecast-server
//!
//! Axum HTTP + `WebSocket` server around the wirecast framing protocol.
//!
//! - `WebSocket` gateway: upgrade handling, per-connection session loop
//! - Connection registry: concurrent id-to-transport mapping with
//!   point-in-time snapshots
//! - Connection manager: connect/send/broadcast/close orchestration over
//!   the chunked binary pipeline and single-frame text path
//! - HTTP endpoints: health check, connection enumeration
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod handshake;
pub mod health;
pub mod server;
pub mod shutdown;
pub mod websocket;

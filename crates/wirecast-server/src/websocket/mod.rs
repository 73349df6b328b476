//! WebSocket connection lifecycle, registry, and outbound delivery.

pub mod manager;
pub mod registry;
pub mod session;
pub mod transport;

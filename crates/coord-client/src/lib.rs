//! Realtime WebSocket client for coordinator sessions.
//!
//! One [`RealtimeClient`] owns one logical connection per session. It performs
//! the authentication handshake, subscribes to named event types, keeps the
//! connection alive with periodic pings, reconnects a bounded number of times
//! after unclean closes, and dispatches typed frames to registered listeners.

mod client;
mod config;
mod dispatch;
mod endpoint;

pub use client::{ConnectionState, RealtimeClient};
pub use config::ClientConfig;
pub use dispatch::{HandlerId, ListenerRegistry};
pub use endpoint::Endpoint;

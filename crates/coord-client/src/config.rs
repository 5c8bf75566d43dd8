use std::time::Duration;

use secrecy::SecretString;

use coord_core::ids::ClientId;

/// Configuration for a [`crate::RealtimeClient`].
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Client identity to present on connect. When absent, the server assigns
    /// one on the first handshake and the client reuses it for reconnects.
    pub client_id: Option<ClientId>,
    /// Bearer credential appended to the connection URL. Absent means the
    /// connection proceeds unauthenticated; the server may reject it.
    pub token: Option<SecretString>,
    /// Event types to subscribe to immediately upon connect.
    pub subscriptions: Vec<String>,
    /// Constant delay between reconnection attempts.
    pub reconnect_delay: Duration,
    /// Upper bound on consecutive reconnection attempts.
    pub max_reconnect_attempts: u32,
    /// Keep-alive ping interval while connected.
    pub ping_interval: Duration,
}

impl ClientConfig {
    pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(2000);
    pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
    pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(30);

    pub fn new() -> Self {
        Self {
            client_id: None,
            token: None,
            subscriptions: Vec::new(),
            reconnect_delay: Self::DEFAULT_RECONNECT_DELAY,
            max_reconnect_attempts: Self::DEFAULT_MAX_RECONNECT_ATTEMPTS,
            ping_interval: Self::DEFAULT_PING_INTERVAL,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

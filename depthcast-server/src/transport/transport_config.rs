use std::time::Duration;

/// Configuration for WebRTC peer connections.
#[derive(Clone, Debug)]
pub struct TransportConfig {
    /// STUN/TURN urls. Empty is fine on a LAN where host candidates suffice.
    pub ice_servers: Vec<String>,
    pub username: String,
    pub credential: String,
    /// Upper bound on waiting for local candidates before the answer is sent.
    pub gathering_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ice_servers: Vec::new(),
            username: String::new(),
            credential: String::new(),
            gathering_timeout: Duration::from_millis(3000),
        }
    }
}

use async_trait::async_trait;
use depthcast_core::ClientId;

/// The way back to signaling clients, used by the session manager to deliver
/// negotiation results.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    /// Sends an SDP answer addressed to `client_id`.
    async fn send_answer(&self, client_id: ClientId, sdp: String);
}

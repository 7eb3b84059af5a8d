use depthcast_core::ClientId;
use serde_json::Value;
use tokio::sync::oneshot;

/// Commands delivered to the session manager from the signaling router.
#[derive(Debug)]
pub enum SessionCommand {
    /// A client sent an SDP offer.
    Offer { client_id: ClientId, sdp: String },

    /// A client answered an offer this side made.
    Answer { client_id: ClientId, sdp: String },

    /// A remote ICE candidate, either an object or a bare candidate line.
    IceCandidate { client_id: ClientId, candidate: Value },

    /// The client's signaling connection went away.
    Disconnect { client_id: ClientId },

    /// Close every session and stop the manager; `done` fires afterwards.
    Shutdown { done: oneshot::Sender<()> },
}

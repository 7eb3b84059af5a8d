use crate::media::FrameSubscription;
use crate::transport::transport_event::TransportEvent;
use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use depthcast_core::ClientId;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl ConnectionState {
    /// States after which the transport will never carry media again.
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Failed | ConnectionState::Closed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::New => "new",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Failed => "failed",
            ConnectionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Negotiated direction of one media section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaDirection {
    Unset,
    SendRecv,
    SendOnly,
    RecvOnly,
    Inactive,
}

/// Outbound half of a session's control data channel.
#[async_trait]
pub trait ControlChannel: Send + Sync {
    fn label(&self) -> String;

    async fn send_text(&self, text: String) -> Result<()>;
}

/// A control channel, opened by either side: the sending half plus the queue
/// its inbound messages are delivered to.
pub struct ControlChannelHandle {
    pub channel: Arc<dyn ControlChannel>,
    pub inbound: mpsc::Receiver<Bytes>,
}

/// One peer connection, driven by the session manager through negotiation.
#[async_trait]
pub trait RealtimeTransport: Send + Sync {
    /// Applies the client's offer.
    async fn set_remote_description(&self, sdp: String) -> Result<()>;

    async fn has_remote_description(&self) -> bool;

    /// Applies an answer to an offer this side originated.
    async fn set_remote_answer(&self, sdp: String) -> Result<()>;

    async fn media_directions(&self) -> Vec<MediaDirection>;

    async fn set_media_direction(&self, index: usize, direction: MediaDirection) -> Result<()>;

    async fn create_answer(&self) -> Result<String>;

    /// Applies the local answer and returns the SDP to hand to the client,
    /// which may differ from the input once local candidates are included.
    async fn set_local_description(&self, sdp: String) -> Result<String>;

    /// Starts feeding the session's outgoing video from `frames`.
    async fn add_outgoing_media(&self, frames: FrameSubscription) -> Result<()>;

    async fn create_data_channel(&self, label: &str) -> Result<ControlChannelHandle>;

    /// Data channels opened by the client, delivered as they arrive. Only
    /// the first call returns the queue.
    async fn take_incoming_channels(&self) -> Option<mpsc::Receiver<ControlChannelHandle>>;

    /// `candidate` is the JSON form of an ICE candidate init.
    async fn add_ice_candidate(&self, candidate: String) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// Creates transports. Every state change of the created transport is
/// reported on `events`, tagged with `client_id` and `generation`.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn create(
        &self,
        client_id: ClientId,
        generation: u64,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Box<dyn RealtimeTransport>>;
}

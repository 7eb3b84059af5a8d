use crate::model::client::ClientId;
use crate::model::room::RoomId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Messages exchanged over the signaling WebSocket.
///
/// The `type` tag doubles as the session-description type for `offer` and
/// `answer`, so those variants carry only the `sdp` body. Relayed messages get
/// a `sender`; answers produced by the server are addressed with `target`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalMessage {
    Join {
        #[serde(default)]
        room: RoomId,
    },
    Leave {
        #[serde(default)]
        room: RoomId,
    },
    Offer {
        sdp: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<ClientId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room: Option<RoomId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sender: Option<ClientId>,
    },
    Answer {
        sdp: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<ClientId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room: Option<RoomId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sender: Option<ClientId>,
    },
    IceCandidate {
        /// Either an `RTCIceCandidateInit` object or a bare candidate line.
        candidate: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<ClientId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room: Option<RoomId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sender: Option<ClientId>,
    },
    PeerJoined {
        peer_id: ClientId,
    },
    PeerLeft {
        peer_id: ClientId,
    },
}

impl SignalMessage {
    pub fn answer_to(target: ClientId, sdp: String) -> Self {
        Self::Answer {
            sdp,
            target: Some(target),
            room: None,
            sender: None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::Leave { .. } => "leave",
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::IceCandidate { .. } => "ice_candidate",
            Self::PeerJoined { .. } => "peer_joined",
            Self::PeerLeft { .. } => "peer_left",
        }
    }

    /// Explicit relay target, if the message names one.
    pub fn target(&self) -> Option<ClientId> {
        match self {
            Self::Offer { target, .. }
            | Self::Answer { target, .. }
            | Self::IceCandidate { target, .. } => *target,
            _ => None,
        }
    }

    /// Room a relayed message is scoped to; negotiation messages without one
    /// fall back to the default room.
    pub fn relay_room(&self) -> RoomId {
        match self {
            Self::Offer { room, .. } | Self::Answer { room, .. } | Self::IceCandidate { room, .. } => {
                room.clone().unwrap_or_default()
            }
            Self::Join { room } | Self::Leave { room } => room.clone(),
            _ => RoomId::default(),
        }
    }

    pub fn with_sender(mut self, id: ClientId) -> Self {
        match &mut self {
            Self::Offer { sender, .. }
            | Self::Answer { sender, .. }
            | Self::IceCandidate { sender, .. } => *sender = Some(id),
            _ => {}
        }
        self
    }
}

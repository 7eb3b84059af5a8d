use crate::session::SessionCommand;
use crate::signaling::signaling_output::SignalingOutput;
use async_trait::async_trait;
use axum::extract::ws::Message;
use dashmap::DashMap;
use depthcast_core::{ClientId, RoomId, SignalMessage};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

struct RouterInner {
    clients: DashMap<ClientId, mpsc::UnboundedSender<Message>>,
    rooms: DashMap<RoomId, HashSet<ClientId>>,
}

/// Live signaling clients and the rooms they have joined.
///
/// Negotiation messages go to the session manager when one is registered and
/// are relayed between clients otherwise. Room notifications are best effort:
/// a join racing a leave may or may not see the other's notification.
#[derive(Clone)]
pub struct SignalingRouter {
    inner: Arc<RouterInner>,
    session_tx: Option<mpsc::Sender<SessionCommand>>,
}

impl SignalingRouter {
    /// A pure relay with no session manager behind it.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RouterInner {
                clients: DashMap::new(),
                rooms: DashMap::new(),
            }),
            session_tx: None,
        }
    }

    pub fn with_session_manager(session_tx: mpsc::Sender<SessionCommand>) -> Self {
        Self {
            session_tx: Some(session_tx),
            ..Self::new()
        }
    }

    /// Registers a new connection and returns its id.
    pub fn accept(&self, tx: mpsc::UnboundedSender<Message>) -> ClientId {
        let client_id = ClientId::new();
        self.inner.clients.insert(client_id, tx);
        info!("Signaling client connected: {}", client_id);
        client_id
    }

    pub fn is_connected(&self, client_id: &ClientId) -> bool {
        self.inner.clients.contains_key(client_id)
    }

    pub fn client_count(&self) -> usize {
        self.inner.clients.len()
    }

    /// Parses and routes one text message from `client_id`. Bad input is
    /// logged and dropped.
    pub async fn dispatch(&self, client_id: ClientId, text: &str) {
        let msg = match serde_json::from_str::<SignalMessage>(text) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("Invalid signaling message from {}: {}", client_id, e);
                return;
            }
        };

        debug!("{} from {}", msg.kind(), client_id);
        match msg {
            SignalMessage::Join { room } => {
                self.join_room(client_id, room);
            }
            SignalMessage::Leave { room } => {
                self.leave_room(client_id, &room);
            }
            SignalMessage::Offer { .. }
            | SignalMessage::Answer { .. }
            | SignalMessage::IceCandidate { .. } => self.route_negotiation(client_id, msg).await,
            SignalMessage::PeerJoined { .. } | SignalMessage::PeerLeft { .. } => {
                warn!("Ignoring server-only message {} from {}", msg.kind(), client_id);
            }
        }
    }

    /// Adds `client_id` to `room` and tells the other members. Returns false
    /// if the client is not (or no longer) connected.
    pub fn join_room(&self, client_id: ClientId, room: RoomId) -> bool {
        if !self.is_connected(&client_id) {
            warn!("Join from unknown client {}", client_id);
            return false;
        }

        let inserted = self
            .inner
            .rooms
            .entry(room.clone())
            .or_default()
            .insert(client_id);

        // A disconnect that ran between the check above and the insert would
        // not have seen this membership.
        if !self.is_connected(&client_id) {
            self.remove_member(&room, &client_id);
            return false;
        }

        if inserted {
            info!("Client {} joined room '{}'", client_id, room);
            self.broadcast_to_room(
                &room,
                &SignalMessage::PeerJoined { peer_id: client_id },
                Some(client_id),
            );
        }
        true
    }

    /// Removes `client_id` from `room`; a no-op if it was not a member.
    pub fn leave_room(&self, client_id: ClientId, room: &RoomId) -> bool {
        if !self.remove_member(room, &client_id) {
            return false;
        }
        info!("Client {} left room '{}'", client_id, room);
        self.broadcast_to_room(
            room,
            &SignalMessage::PeerLeft { peer_id: client_id },
            Some(client_id),
        );
        true
    }

    /// Sends `msg` to every current member of `room` except `exclude`.
    /// Returns how many members it was delivered to.
    pub fn broadcast_to_room(
        &self,
        room: &RoomId,
        msg: &SignalMessage,
        exclude: Option<ClientId>,
    ) -> usize {
        let members: Vec<ClientId> = match self.inner.rooms.get(room) {
            Some(members) => members.iter().copied().collect(),
            None => return 0,
        };

        let json = match serde_json::to_string(msg) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize signal message: {}", e);
                return 0;
            }
        };

        members
            .into_iter()
            .filter(|member| Some(*member) != exclude)
            .filter(|member| self.send_text(member, &json))
            .count()
    }

    pub fn send_signal(&self, client_id: ClientId, msg: &SignalMessage) -> bool {
        match serde_json::to_string(msg) {
            Ok(json) => self.send_text(&client_id, &json),
            Err(e) => {
                error!("Failed to serialize signal message: {}", e);
                false
            }
        }
    }

    /// Drops the client from the registry and from every room. Safe to call
    /// more than once.
    pub async fn disconnect(&self, client_id: ClientId) {
        let was_connected = self.inner.clients.remove(&client_id).is_some();

        for room in self.rooms_of(&client_id) {
            self.leave_room(client_id, &room);
        }

        if !was_connected {
            return;
        }
        info!("Signaling client disconnected: {}", client_id);

        if let Some(session_tx) = &self.session_tx {
            if session_tx
                .send(SessionCommand::Disconnect { client_id })
                .await
                .is_err()
            {
                debug!("Session manager gone; nothing to tear down for {}", client_id);
            }
        }
    }

    pub fn rooms_of(&self, client_id: &ClientId) -> Vec<RoomId> {
        self.inner
            .rooms
            .iter()
            .filter(|entry| entry.value().contains(client_id))
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn room_members(&self, room: &RoomId) -> HashSet<ClientId> {
        self.inner
            .rooms
            .get(room)
            .map(|members| members.clone())
            .unwrap_or_default()
    }

    async fn route_negotiation(&self, sender: ClientId, msg: SignalMessage) {
        let Some(session_tx) = &self.session_tx else {
            self.relay(sender, msg);
            return;
        };

        let cmd = match msg {
            SignalMessage::Offer { sdp, .. } => SessionCommand::Offer {
                client_id: sender,
                sdp,
            },
            SignalMessage::Answer { sdp, .. } => SessionCommand::Answer {
                client_id: sender,
                sdp,
            },
            SignalMessage::IceCandidate { candidate, .. } => SessionCommand::IceCandidate {
                client_id: sender,
                candidate,
            },
            _ => return,
        };

        if let Err(e) = session_tx.send(cmd).await {
            error!("Session manager died: {}", e);
        }
    }

    fn relay(&self, sender: ClientId, msg: SignalMessage) {
        let msg = msg.with_sender(sender);
        if let Some(target) = msg.target().filter(|t| self.is_connected(t)) {
            self.send_signal(target, &msg);
            return;
        }
        let room = msg.relay_room();
        let delivered = self.broadcast_to_room(&room, &msg, Some(sender));
        debug!(
            "Relayed {} from {} to {} member(s) of '{}'",
            msg.kind(),
            sender,
            delivered,
            room
        );
    }

    fn remove_member(&self, room: &RoomId, client_id: &ClientId) -> bool {
        let removed = match self.inner.rooms.get_mut(room) {
            Some(mut members) => members.remove(client_id),
            None => false,
        };
        self.inner.rooms.remove_if(room, |_, members| members.is_empty());
        removed
    }

    fn send_text(&self, client_id: &ClientId, json: &str) -> bool {
        let Some(client) = self.inner.clients.get(client_id) else {
            warn!("Attempted to send signal to disconnected client {}", client_id);
            return false;
        };
        match client.send(Message::Text(json.to_owned().into())) {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to send WS message to {}: {}", client_id, e);
                false
            }
        }
    }
}

impl Default for SignalingRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SignalingOutput for SignalingRouter {
    async fn send_answer(&self, client_id: ClientId, sdp: String) {
        self.send_signal(client_id, &SignalMessage::answer_to(client_id, sdp));
    }
}

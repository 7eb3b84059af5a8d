use crate::media::FrameProducer;
use crate::session::session_state::SessionState;
use crate::transport::RealtimeTransport;
use depthcast_core::ClientId;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// One negotiated client: its transport plus the tasks feeding it.
pub struct PeerSession {
    pub id: ClientId,
    pub generation: u64,
    state: SessionState,
    pub(crate) transport: Arc<dyn RealtimeTransport>,
    pub(crate) subscribed: bool,
    pub(crate) negotiation: Option<JoinHandle<()>>,
    pub(crate) control_task: Option<JoinHandle<()>>,
    pub(crate) incoming_controls: Option<JoinHandle<()>>,
    pub(crate) watchdog: Option<JoinHandle<()>>,
}

impl PeerSession {
    pub fn new(id: ClientId, generation: u64, transport: Arc<dyn RealtimeTransport>) -> Self {
        Self {
            id,
            generation,
            state: SessionState::Created,
            transport,
            subscribed: false,
            negotiation: None,
            control_task: None,
            incoming_controls: None,
            watchdog: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Moves to `next` if the lifecycle allows it.
    pub fn transition(&mut self, next: SessionState) -> bool {
        if !self.state.can_transition_to(next) {
            warn!(
                "Session {} cannot go from {} to {}",
                self.id, self.state, next
            );
            return false;
        }
        debug!("Session {}: {} -> {}", self.id, self.state, next);
        self.state = next;
        true
    }

    /// Releases everything the session holds. Failures are logged only.
    pub async fn close(&mut self, producer: &FrameProducer) {
        if self.state.is_closed() {
            return;
        }
        self.transition(SessionState::Closed);

        let tasks = [
            self.negotiation.take(),
            self.watchdog.take(),
            self.control_task.take(),
            self.incoming_controls.take(),
        ];
        for task in tasks.into_iter().flatten() {
            task.abort();
        }
        if self.subscribed {
            producer.unsubscribe(&self.id);
            self.subscribed = false;
        }
        if let Err(e) = self.transport.close().await {
            warn!("Closing transport for {} failed: {:#}", self.id, e);
        }
    }
}

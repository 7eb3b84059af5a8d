use crate::control::ControlDispatcher;
use crate::media::FrameProducer;
use crate::session::control_loop::{run_control_loop, serve_incoming_channels};
use crate::session::negotiation::{NegotiationOutcome, negotiate};
use crate::session::peer_session::PeerSession;
use crate::session::session_command::SessionCommand;
use crate::session::session_state::SessionState;
use crate::signaling::SignalingOutput;
use crate::transport::{ConnectionState, RealtimeTransport, TransportEvent, TransportFactory};
use anyhow::{Context, Result, bail};
use depthcast_core::ClientId;
use futures::future::join_all;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Owns every peer session and drives it through negotiation.
///
/// All session state is touched only from the manager's own task; commands
/// arrive from the signaling router, state changes from the transports and
/// finished negotiations from their per-session tasks, all over channels.
/// A slow negotiation therefore never holds up other sessions.
pub struct PeerSessionManager {
    sessions: HashMap<ClientId, PeerSession>,
    factory: Arc<dyn TransportFactory>,
    producer: Arc<FrameProducer>,
    dispatcher: ControlDispatcher,
    signaling: Arc<dyn SignalingOutput>,
    transport_rx: mpsc::Receiver<TransportEvent>,
    transport_tx: mpsc::Sender<TransportEvent>,
    negotiation_rx: mpsc::Receiver<NegotiationOutcome>,
    negotiation_tx: mpsc::Sender<NegotiationOutcome>,
    next_generation: u64,
    connect_timeout: Duration,
}

impl PeerSessionManager {
    pub fn new(
        factory: Arc<dyn TransportFactory>,
        producer: Arc<FrameProducer>,
        signaling: Arc<dyn SignalingOutput>,
        connect_timeout: Duration,
    ) -> Self {
        let (transport_tx, transport_rx) = mpsc::channel(256);
        let (negotiation_tx, negotiation_rx) = mpsc::channel(64);

        Self {
            sessions: HashMap::new(),
            factory,
            dispatcher: ControlDispatcher::new(Arc::clone(&producer)),
            producer,
            signaling,
            transport_rx,
            transport_tx,
            negotiation_rx,
            negotiation_tx,
            next_generation: 0,
            connect_timeout,
        }
    }

    pub async fn run(mut self, mut command_rx: mpsc::Receiver<SessionCommand>) {
        info!("Session manager started");

        loop {
            tokio::select! {
                cmd = command_rx.recv() => {
                    match cmd {
                        Some(c) => {
                            let shutdown = matches!(c, SessionCommand::Shutdown { .. });
                            self.handle_command(c).await;
                            if shutdown {
                                break;
                            }
                        }
                        None => {
                            info!("Command channel closed. Closing all sessions.");
                            self.stop().await;
                            break;
                        }
                    }
                }

                Some(evt) = self.transport_rx.recv() => {
                    self.handle_transport_event(evt).await;
                }

                Some(outcome) = self.negotiation_rx.recv() => {
                    // Failures are logged where they are applied.
                    let _ = self.finish_negotiation(outcome).await;
                }
            }
        }

        info!("Session manager finished");
    }

    pub async fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Offer { client_id, sdp } => {
                if let Err(e) = self.begin_negotiation(client_id, sdp).await {
                    error!("Negotiation with {} failed: {:#}", client_id, e);
                }
            }
            SessionCommand::Answer { client_id, sdp } => self.handle_answer(client_id, sdp).await,
            SessionCommand::IceCandidate {
                client_id,
                candidate,
            } => self.handle_ice_candidate(client_id, candidate).await,
            SessionCommand::Disconnect { client_id } => {
                self.remove(&client_id).await;
            }
            SessionCommand::Shutdown { done } => {
                self.stop().await;
                let _ = done.send(());
            }
        }
    }

    /// Negotiates a session for `client_id` from its offer and waits for the
    /// result. The answer is sent through signaling and also returned.
    /// Other negotiations that finish in the meantime are applied too.
    pub async fn handle_offer(&mut self, client_id: ClientId, sdp: String) -> Result<String> {
        let generation = self.begin_negotiation(client_id, sdp).await?;

        while let Some(outcome) = self.negotiation_rx.recv().await {
            let ours = outcome.client_id == client_id && outcome.generation == generation;
            let result = self.finish_negotiation(outcome).await;
            if ours {
                return result;
            }
        }
        bail!("Negotiation channel closed")
    }

    /// Creates the session for an offer and starts negotiating it in its own
    /// task. An existing session for the same client is closed first.
    /// Returns the new session's generation.
    pub async fn begin_negotiation(&mut self, client_id: ClientId, sdp: String) -> Result<u64> {
        info!("Processing offer from {}", client_id);

        if self.sessions.contains_key(&client_id) {
            info!("Replacing existing session for {}", client_id);
            self.remove(&client_id).await;
        }

        let generation = self.next_generation;
        self.next_generation += 1;

        let transport: Arc<dyn RealtimeTransport> = Arc::from(
            self.factory
                .create(client_id, generation, self.transport_tx.clone())
                .await
                .context("Failed to create transport")?,
        );
        let mut session = PeerSession::new(client_id, generation, Arc::clone(&transport));

        if let Some(incoming) = transport.take_incoming_channels().await {
            session.incoming_controls = Some(tokio::spawn(serve_incoming_channels(
                client_id,
                incoming,
                self.dispatcher.clone(),
            )));
        }

        let frames = self.producer.subscribe(client_id);
        session.subscribed = true;

        let outcomes = self.negotiation_tx.clone();
        session.negotiation = Some(tokio::spawn(async move {
            let result = negotiate(transport, sdp, frames).await;
            let _ = outcomes
                .send(NegotiationOutcome {
                    client_id,
                    generation,
                    result,
                })
                .await;
        }));

        self.sessions.insert(client_id, session);
        Ok(generation)
    }

    /// Applies a finished negotiation: on success the control loop and the
    /// connect watchdog start and the answer goes out through signaling; on
    /// failure the session is removed. Results for sessions that were
    /// closed or replaced in the meantime are discarded.
    async fn finish_negotiation(&mut self, outcome: NegotiationOutcome) -> Result<String> {
        let NegotiationOutcome {
            client_id,
            generation,
            result,
        } = outcome;

        let Some(session) = self
            .sessions
            .get_mut(&client_id)
            .filter(|s| s.generation == generation)
        else {
            debug!("Discarding negotiation of a closed session {}", client_id);
            bail!("Session {} closed during negotiation", client_id);
        };

        let negotiated = match result {
            Ok(negotiated) => negotiated,
            Err(e) => {
                error!("Negotiation with {} failed: {:#}", client_id, e);
                session.transition(SessionState::Failed);
                self.remove(&client_id).await;
                return Err(e);
            }
        };

        session.transition(SessionState::RemoteOfferSet);
        session.control_task = Some(tokio::spawn(run_control_loop(
            client_id,
            negotiated.control,
            self.dispatcher.clone(),
        )));
        session.transition(SessionState::AnswerSent);
        session.watchdog = Some(spawn_watchdog(
            self.transport_tx.clone(),
            client_id,
            generation,
            self.connect_timeout,
        ));

        self.signaling
            .send_answer(client_id, negotiated.answer.clone())
            .await;
        Ok(negotiated.answer)
    }

    pub async fn handle_answer(&mut self, client_id: ClientId, sdp: String) {
        let Some(session) = self.sessions.get(&client_id) else {
            warn!("Answer from {} without a session", client_id);
            return;
        };
        if let Err(e) = session.transport.set_remote_answer(sdp).await {
            warn!("Failed to apply answer from {}: {:#}", client_id, e);
        }
    }

    /// Candidates that arrive before the offer has been applied are dropped.
    pub async fn handle_ice_candidate(&mut self, client_id: ClientId, candidate: Value) {
        let Some(session) = self.sessions.get(&client_id) else {
            warn!("ICE candidate from {} without a session", client_id);
            return;
        };
        if !session.transport.has_remote_description().await {
            warn!(
                "Dropping ICE candidate from {}: no remote description yet",
                client_id
            );
            return;
        }
        let Some(candidate) = candidate_init(candidate) else {
            warn!("Invalid ICE candidate format from {}", client_id);
            return;
        };
        let Err(e) = session.transport.add_ice_candidate(candidate).await else {
            debug!("Added ICE candidate for {}", client_id);
            return;
        };
        warn!("Failed to add ICE candidate for {}: {:#}", client_id, e);
    }

    pub async fn handle_transport_event(&mut self, event: TransportEvent) {
        let client_id = event.client_id();
        let Some(session) = self.sessions.get_mut(&client_id) else {
            debug!("Transport event for unknown session {}", client_id);
            return;
        };
        if session.generation != event.generation() {
            debug!("Ignoring event from a replaced transport of {}", client_id);
            return;
        }

        let failed = match event {
            TransportEvent::StateChanged { state, .. } => match state {
                ConnectionState::Connected => {
                    if session.transition(SessionState::Connected) {
                        info!("Session {} connected", client_id);
                        if let Some(watchdog) = session.watchdog.take() {
                            watchdog.abort();
                        }
                    }
                    false
                }
                ConnectionState::Disconnected => {
                    info!("Session {} disconnected, waiting for recovery", client_id);
                    false
                }
                state if state.is_terminal() => {
                    warn!("Transport for {} is {}", client_id, state);
                    true
                }
                _ => false,
            },
            TransportEvent::ConnectTimeout { .. } => {
                if session.state() == SessionState::Connected {
                    false
                } else {
                    warn!(
                        "Session {} did not connect within {:?}",
                        client_id, self.connect_timeout
                    );
                    true
                }
            }
        };

        if failed {
            session.transition(SessionState::Failed);
            self.remove(&client_id).await;
        }
    }

    /// Processes transport events that are already queued.
    pub async fn drain_transport_events(&mut self) {
        while let Ok(event) = self.transport_rx.try_recv() {
            self.handle_transport_event(event).await;
        }
    }

    /// Closes and forgets the session. Returns false if there was none.
    pub async fn remove(&mut self, client_id: &ClientId) -> bool {
        let Some(mut session) = self.sessions.remove(client_id) else {
            return false;
        };
        session.close(&self.producer).await;
        info!("Removed session {}", client_id);
        true
    }

    /// Closes every session concurrently, then releases the sensor.
    pub async fn stop(&mut self) {
        let sessions: Vec<PeerSession> = self.sessions.drain().map(|(_, s)| s).collect();
        let count = sessions.len();
        let producer = &self.producer;

        join_all(sessions.into_iter().map(|mut session| async move {
            session.close(producer).await;
        }))
        .await;

        self.producer.stop().await;
        info!("Closed {} session(s)", count);
    }

    pub fn session_state(&self, client_id: &ClientId) -> Option<SessionState> {
        self.sessions.get(client_id).map(PeerSession::state)
    }

    pub fn active_sessions(&self) -> Vec<ClientId> {
        self.sessions.keys().copied().collect()
    }
}

fn spawn_watchdog(
    tx: mpsc::Sender<TransportEvent>,
    client_id: ClientId,
    generation: u64,
    timeout: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        let _ = tx
            .send(TransportEvent::ConnectTimeout {
                client_id,
                generation,
            })
            .await;
    })
}

/// Accepts `{candidate, sdpMid, sdpMLineIndex}` objects or a bare candidate
/// line and returns the JSON the transport expects.
fn candidate_init(candidate: Value) -> Option<String> {
    let init = match candidate {
        Value::String(line) if !line.is_empty() => json!({ "candidate": line, "sdpMLineIndex": 0 }),
        Value::Object(map) if map.get("candidate").is_some_and(Value::is_string) => {
            Value::Object(map)
        }
        _ => return None,
    };
    serde_json::to_string(&init).ok()
}

/// Cloneable handle for stopping a running manager from outside its task.
#[derive(Clone)]
pub struct SessionManagerHandle {
    tx: mpsc::Sender<SessionCommand>,
}

impl SessionManagerHandle {
    pub fn new(tx: mpsc::Sender<SessionCommand>) -> Self {
        Self { tx }
    }

    /// Closes every session and waits until the manager has finished.
    pub async fn shutdown(&self) {
        let (done, finished) = oneshot::channel();
        if self.tx.send(SessionCommand::Shutdown { done }).await.is_err() {
            debug!("Session manager already stopped");
            return;
        }
        let _ = finished.await;
    }
}

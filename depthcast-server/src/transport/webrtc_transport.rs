use crate::media::FrameSubscription;
use crate::transport::realtime_transport::{
    ConnectionState, ControlChannel, ControlChannelHandle, MediaDirection, RealtimeTransport,
    TransportFactory,
};
use crate::transport::transport_config::TransportConfig;
use crate::transport::transport_event::TransportEvent;
use crate::transport::video_encoder::{EncoderFactory, VideoEncoder};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use depthcast_core::ClientId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_H264, MediaEngine};
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::media::Sample;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

const CONTROL_QUEUE: usize = 64;

/// [`RealtimeTransport`] backed by a webrtc-rs peer connection.
pub struct WebRtcTransport {
    client_id: ClientId,
    peer_connection: Arc<RTCPeerConnection>,
    gathering_timeout: Duration,
    encoder_factory: Option<EncoderFactory>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    incoming: Mutex<Option<mpsc::Receiver<ControlChannelHandle>>>,
}

impl WebRtcTransport {
    /// Sets up a new peer connection. State changes are reported on
    /// `event_tx` for the session manager loop.
    pub async fn new(
        client_id: ClientId,
        generation: u64,
        config: &TransportConfig,
        encoder_factory: Option<EncoderFactory>,
        event_tx: mpsc::Sender<TransportEvent>,
    ) -> Result<Self> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let ice_servers = if config.ice_servers.is_empty() {
            Vec::new()
        } else {
            vec![RTCIceServer {
                urls: config.ice_servers.clone(),
                username: config.username.clone(),
                credential: config.credential.clone(),
                ..Default::default()
            }]
        };
        let rtc_config = RTCConfiguration {
            ice_servers,
            ..Default::default()
        };

        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await?);

        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let tx = event_tx.clone();
                Box::pin(async move {
                    info!("Peer connection state changed for {}: {}", client_id, s);
                    let _ = tx
                        .send(TransportEvent::StateChanged {
                            client_id,
                            generation,
                            state: connection_state(s),
                        })
                        .await;
                })
            },
        ));

        let (incoming_tx, incoming_rx) = mpsc::channel(CONTROL_QUEUE);
        peer_connection.on_data_channel(Box::new(move |data_channel: Arc<RTCDataChannel>| {
            let incoming_tx = incoming_tx.clone();
            Box::pin(async move {
                info!(
                    "Client {} opened data channel '{}'",
                    client_id,
                    data_channel.label()
                );
                let _ = incoming_tx.send(control_handle(data_channel)).await;
            })
        }));

        Ok(Self {
            client_id,
            peer_connection,
            gathering_timeout: config.gathering_timeout,
            encoder_factory,
            tasks: Mutex::new(Vec::new()),
            incoming: Mutex::new(Some(incoming_rx)),
        })
    }
}

#[async_trait]
impl RealtimeTransport for WebRtcTransport {
    async fn set_remote_description(&self, sdp: String) -> Result<()> {
        let desc = RTCSessionDescription::offer(sdp).context("Invalid SDP offer")?;
        self.peer_connection.set_remote_description(desc).await?;
        Ok(())
    }

    async fn has_remote_description(&self) -> bool {
        self.peer_connection.remote_description().await.is_some()
    }

    async fn set_remote_answer(&self, sdp: String) -> Result<()> {
        let desc = RTCSessionDescription::answer(sdp).context("Invalid SDP answer")?;
        self.peer_connection.set_remote_description(desc).await?;
        Ok(())
    }

    async fn media_directions(&self) -> Vec<MediaDirection> {
        self.peer_connection
            .get_transceivers()
            .await
            .iter()
            .map(|t| media_direction(t.direction()))
            .collect()
    }

    async fn set_media_direction(&self, index: usize, direction: MediaDirection) -> Result<()> {
        let transceivers = self.peer_connection.get_transceivers().await;
        let transceiver = transceivers
            .get(index)
            .ok_or_else(|| anyhow!("No transceiver at index {}", index))?;
        transceiver.set_direction(rtc_direction(direction)).await;
        Ok(())
    }

    async fn create_answer(&self) -> Result<String> {
        let answer = self.peer_connection.create_answer(None).await?;
        Ok(answer.sdp)
    }

    async fn set_local_description(&self, sdp: String) -> Result<String> {
        let desc = RTCSessionDescription::answer(sdp.clone())?;
        let mut gathering_complete = self.peer_connection.gathering_complete_promise().await;
        self.peer_connection.set_local_description(desc).await?;

        // Candidates are not trickled to the client, so the answer has to
        // carry them.
        if tokio::time::timeout(self.gathering_timeout, gathering_complete.recv())
            .await
            .is_err()
        {
            warn!(
                "ICE gathering for {} did not finish within {:?}",
                self.client_id, self.gathering_timeout
            );
        }

        Ok(self
            .peer_connection
            .local_description()
            .await
            .map(|d| d.sdp)
            .unwrap_or(sdp))
    }

    async fn add_outgoing_media(&self, frames: FrameSubscription) -> Result<()> {
        let track = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_H264.to_owned(),
                clock_rate: 90000,
                channels: 0,
                sdp_fmtp_line:
                    "level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42e01f"
                        .to_owned(),
                rtcp_feedback: vec![],
            },
            "video".to_owned(),
            "depthcast".to_owned(),
        ));

        let sender = self
            .peer_connection
            .add_track(Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .context("Failed to add video track")?;

        let mut tasks = self.tasks.lock().await;

        // Interceptors only run while RTCP is being read.
        tasks.push(tokio::spawn(async move {
            let mut buf = vec![0u8; 1500];
            while sender.read(&mut buf).await.is_ok() {}
        }));

        match &self.encoder_factory {
            Some(factory) => {
                let encoder = factory()?;
                tasks.push(tokio::spawn(pump_frames(
                    self.client_id,
                    track,
                    frames,
                    encoder,
                )));
            }
            None => warn!(
                "No video encoder configured; video track for {} stays empty",
                self.client_id
            ),
        }
        Ok(())
    }

    async fn create_data_channel(&self, label: &str) -> Result<ControlChannelHandle> {
        let data_channel = self
            .peer_connection
            .create_data_channel(label, None)
            .await
            .context("Failed to create data channel")?;

        let client_id = self.client_id;
        data_channel.on_open(Box::new(move || {
            Box::pin(async move {
                info!("Control channel open for {}", client_id);
            })
        }));

        Ok(control_handle(data_channel))
    }

    async fn take_incoming_channels(&self) -> Option<mpsc::Receiver<ControlChannelHandle>> {
        self.incoming.lock().await.take()
    }

    async fn add_ice_candidate(&self, candidate: String) -> Result<()> {
        let candidate: RTCIceCandidateInit =
            serde_json::from_str(&candidate).context("Failed to parse ICE candidate JSON")?;
        self.peer_connection.add_ice_candidate(candidate).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        for task in self.tasks.lock().await.drain(..) {
            task.abort();
        }
        self.peer_connection.close().await?;
        Ok(())
    }
}

/// Routes the channel's inbound messages into a queue.
fn control_handle(data_channel: Arc<RTCDataChannel>) -> ControlChannelHandle {
    let (tx, rx) = mpsc::channel(CONTROL_QUEUE);
    data_channel.on_message(Box::new(move |msg: DataChannelMessage| {
        let tx = tx.clone();
        Box::pin(async move {
            let _ = tx.send(msg.data).await;
        })
    }));

    ControlChannelHandle {
        channel: Arc::new(WebRtcControlChannel { data_channel }),
        inbound: rx,
    }
}

struct WebRtcControlChannel {
    data_channel: Arc<RTCDataChannel>,
}

#[async_trait]
impl ControlChannel for WebRtcControlChannel {
    fn label(&self) -> String {
        self.data_channel.label().to_owned()
    }

    async fn send_text(&self, text: String) -> Result<()> {
        self.data_channel.send_text(text).await?;
        Ok(())
    }
}

async fn pump_frames(
    client_id: ClientId,
    track: Arc<TrackLocalStaticSample>,
    mut frames: FrameSubscription,
    mut encoder: Box<dyn VideoEncoder>,
) {
    while let Some(frame) = frames.next_frame().await {
        let data = match encoder.encode(&frame) {
            Ok(data) => data,
            Err(e) => {
                warn!("Encoding frame for {} failed: {:#}", client_id, e);
                continue;
            }
        };
        let sample = Sample {
            data,
            duration: frames.frame_interval(),
            ..Default::default()
        };
        if let Err(e) = track.write_sample(&sample).await {
            debug!("Dropped video sample for {}: {}", client_id, e);
        }
    }
    debug!("Video feed for {} ended", client_id);
}

fn connection_state(state: RTCPeerConnectionState) -> ConnectionState {
    match state {
        RTCPeerConnectionState::Unspecified | RTCPeerConnectionState::New => ConnectionState::New,
        RTCPeerConnectionState::Connecting => ConnectionState::Connecting,
        RTCPeerConnectionState::Connected => ConnectionState::Connected,
        RTCPeerConnectionState::Disconnected => ConnectionState::Disconnected,
        RTCPeerConnectionState::Failed => ConnectionState::Failed,
        RTCPeerConnectionState::Closed => ConnectionState::Closed,
    }
}

fn media_direction(direction: RTCRtpTransceiverDirection) -> MediaDirection {
    match direction {
        RTCRtpTransceiverDirection::Unspecified => MediaDirection::Unset,
        RTCRtpTransceiverDirection::Sendrecv => MediaDirection::SendRecv,
        RTCRtpTransceiverDirection::Sendonly => MediaDirection::SendOnly,
        RTCRtpTransceiverDirection::Recvonly => MediaDirection::RecvOnly,
        RTCRtpTransceiverDirection::Inactive => MediaDirection::Inactive,
    }
}

fn rtc_direction(direction: MediaDirection) -> RTCRtpTransceiverDirection {
    match direction {
        MediaDirection::Unset => RTCRtpTransceiverDirection::Unspecified,
        MediaDirection::SendRecv => RTCRtpTransceiverDirection::Sendrecv,
        MediaDirection::SendOnly => RTCRtpTransceiverDirection::Sendonly,
        MediaDirection::RecvOnly => RTCRtpTransceiverDirection::Recvonly,
        MediaDirection::Inactive => RTCRtpTransceiverDirection::Inactive,
    }
}

/// Builds a [`WebRtcTransport`] per negotiated session.
pub struct WebRtcTransportFactory {
    config: TransportConfig,
    encoder_factory: Option<EncoderFactory>,
}

impl WebRtcTransportFactory {
    pub fn new(config: TransportConfig, encoder_factory: Option<EncoderFactory>) -> Self {
        Self {
            config,
            encoder_factory,
        }
    }
}

#[async_trait]
impl TransportFactory for WebRtcTransportFactory {
    async fn create(
        &self,
        client_id: ClientId,
        generation: u64,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Box<dyn RealtimeTransport>> {
        let transport = WebRtcTransport::new(
            client_id,
            generation,
            &self.config,
            self.encoder_factory.clone(),
            events,
        )
        .await?;
        Ok(Box::new(transport))
    }
}

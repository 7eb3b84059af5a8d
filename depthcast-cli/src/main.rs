use anyhow::{Context, Result};
use clap::Parser;
use depthcast_server::{
    ColormapRenderer, FrameProducer, PeerSessionManager, ServerConfig, SessionManagerHandle,
    SignalingRouter, SyntheticDepthSource, WebRtcTransportFactory, default_encoder_factory,
    signaling_routes,
};
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "depthcast", version, about = "Streams a depth sensor to browsers over WebRTC")]
struct Args {
    #[arg(long, env = "WEBRTC_HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    #[arg(long, env = "WEBRTC_PORT", default_value_t = 8080)]
    port: u16,

    #[arg(long, env = "WEBRTC_SIGNALING_PATH", default_value = "/ws")]
    signaling_path: String,

    /// Comma-separated STUN/TURN urls.
    #[arg(long, env = "ICE_SERVERS", value_delimiter = ',')]
    ice_servers: Vec<String>,

    #[arg(long, env = "PROCESSING_FPS_LIMIT", default_value_t = 30)]
    fps_limit: u32,

    #[arg(long, env = "PROCESSING_FRAME_TIMEOUT_MS", default_value_t = 2000)]
    frame_timeout_ms: u64,

    #[arg(long, env = "CAMERA_MAX_DISTANCE", default_value_t = 4000)]
    max_distance: u32,

    #[arg(long, env = "CAMERA_CONFIDENCE_THRESHOLD", default_value_t = 30)]
    confidence_threshold: u8,

    #[arg(long, env = "CAMERA_COLORMAP", default_value = "RAINBOW")]
    colormap: String,

    #[arg(long, env = "SESSION_CONNECT_TIMEOUT_MS", default_value_t = 15_000)]
    connect_timeout_ms: u64,

    #[arg(long, env = "ICE_GATHERING_TIMEOUT_MS", default_value_t = 3000)]
    ice_gathering_timeout_ms: u64,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        ServerConfig {
            host: args.host,
            port: args.port,
            signaling_path: args.signaling_path,
            ice_servers: args
                .ice_servers
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            fps_limit: args.fps_limit,
            frame_timeout_ms: args.frame_timeout_ms,
            max_distance: args.max_distance,
            confidence_threshold: args.confidence_threshold,
            colormap: args.colormap,
            connect_timeout_ms: args.connect_timeout_ms,
            ice_gathering_timeout_ms: args.ice_gathering_timeout_ms,
            log_level: args.log_level,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::from(Args::parse());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Initializing depth streaming server...");

    let params = Arc::new(config.initial_params().context("Invalid CAMERA_COLORMAP")?);
    let producer = Arc::new(FrameProducer::new(
        Box::new(SyntheticDepthSource::new()),
        Arc::new(ColormapRenderer::new()),
        Arc::clone(&params),
        config.frame_timeout(),
    ));
    producer
        .start()
        .await
        .context("Failed to acquire the depth sensor")?;

    let encoder_factory = default_encoder_factory(config.effective_fps_limit());
    if encoder_factory.is_none() {
        warn!("Built without the h264 feature; sessions will receive no video samples");
    }
    let factory = Arc::new(WebRtcTransportFactory::new(
        config.transport_config(),
        encoder_factory,
    ));

    // Signaling forwards negotiation into the session manager over this channel.
    let (session_tx, session_rx) = mpsc::channel(256);
    let router = SignalingRouter::with_session_manager(session_tx.clone());

    let manager = PeerSessionManager::new(
        factory,
        Arc::clone(&producer),
        Arc::new(router.clone()),
        config.connect_timeout(),
    );
    let manager_task = tokio::spawn(manager.run(session_rx));
    let sessions = SessionManagerHandle::new(session_tx);

    let app = signaling_routes(&config.signaling_path, router);
    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Signaling listening on ws://{}{}", addr, config.signaling_path);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await?;

    sessions.shutdown().await;
    if let Err(e) = manager_task.await {
        warn!("Session manager task ended abnormally: {}", e);
    }
    producer.stop().await;

    info!("Server stopped");
    Ok(())
}

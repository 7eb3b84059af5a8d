use crate::media::{MAX_FPS_LIMIT, MIN_FPS_LIMIT, RenderParams, RuntimeParams};
use crate::transport::TransportConfig;
use depthcast_core::{Colormap, UnknownColormap};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Server settings. Every field has a default suitable for a LAN deployment.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub signaling_path: String,
    pub ice_servers: Vec<String>,
    pub fps_limit: u32,
    pub frame_timeout_ms: u64,
    pub max_distance: u32,
    pub confidence_threshold: u8,
    pub colormap: String,
    pub connect_timeout_ms: u64,
    pub ice_gathering_timeout_ms: u64,
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
            signaling_path: "/ws".to_string(),
            ice_servers: Vec::new(),
            fps_limit: MAX_FPS_LIMIT,
            frame_timeout_ms: 2000,
            max_distance: 4000,
            confidence_threshold: 30,
            colormap: Colormap::Rainbow.to_string(),
            connect_timeout_ms: 15_000,
            ice_gathering_timeout_ms: 3000,
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Clamped to the range the producer supports.
    pub fn effective_fps_limit(&self) -> u32 {
        self.fps_limit.clamp(MIN_FPS_LIMIT, MAX_FPS_LIMIT)
    }

    /// Starting values for the shared streaming parameters.
    pub fn initial_params(&self) -> Result<RuntimeParams, UnknownColormap> {
        let colormap: Colormap = self.colormap.parse()?;
        Ok(RuntimeParams::new(
            RenderParams {
                confidence_threshold: self.confidence_threshold,
                colormap,
                max_distance: self.max_distance,
            },
            self.effective_fps_limit(),
        ))
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            ice_servers: self.ice_servers.clone(),
            gathering_timeout: Duration::from_millis(self.ice_gathering_timeout_ms),
            ..TransportConfig::default()
        }
    }
}

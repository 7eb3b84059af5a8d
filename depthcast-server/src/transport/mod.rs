mod realtime_transport;
mod transport_config;
mod transport_event;
mod video_encoder;
mod webrtc_transport;

pub use realtime_transport::*;
pub use transport_config::*;
pub use transport_event::*;
pub use video_encoder::*;
pub use webrtc_transport::*;

use crate::media::RenderedFrame;
use anyhow::Result;
use bytes::Bytes;
use std::sync::Arc;

/// Compresses rendered frames into the bitstream written to the video track.
pub trait VideoEncoder: Send {
    fn encode(&mut self, frame: &RenderedFrame) -> Result<Bytes>;
}

/// Builds one encoder per session; encoders carry per-stream state.
pub type EncoderFactory = Arc<dyn Fn() -> Result<Box<dyn VideoEncoder>> + Send + Sync>;

/// The encoder compiled into this build, if any.
pub fn default_encoder_factory(fps: u32) -> Option<EncoderFactory> {
    #[cfg(feature = "h264")]
    {
        let factory: EncoderFactory = Arc::new(move || {
            let encoder = h264::OpenH264Encoder::new(fps, 1_000_000, fps * 2)?;
            Ok(Box::new(encoder) as Box<dyn VideoEncoder>)
        });
        Some(factory)
    }
    #[cfg(not(feature = "h264"))]
    {
        let _ = fps;
        None
    }
}

#[cfg(feature = "h264")]
pub use h264::OpenH264Encoder;

#[cfg(feature = "h264")]
mod h264 {
    use super::VideoEncoder;
    use crate::media::RenderedFrame;
    use anyhow::{Context, Result};
    use bytes::Bytes;
    use openh264::OpenH264API;
    use openh264::encoder::{
        BitRate, Encoder, EncoderConfig, FrameRate, IntraFramePeriod, RateControlMode, SpsPpsStrategy, UsageType,
    };
    use openh264::formats::{RgbSliceU8, YUVBuffer};

    pub struct OpenH264Encoder {
        encoder: Encoder,
    }

    impl OpenH264Encoder {
        pub fn new(fps: u32, bitrate: u32, keyframe_interval: u32) -> Result<Self> {
            // SPS/PPS ride along with every keyframe so late joiners can decode.
            let config = EncoderConfig::new()
                .usage_type(UsageType::CameraVideoRealTime)
                .max_frame_rate(FrameRate::from_hz(fps as f32))
                .bitrate(BitRate::from_bps(bitrate))
                .rate_control_mode(RateControlMode::Bitrate)
                .sps_pps_strategy(SpsPpsStrategy::ConstantId)
                .intra_frame_period(IntraFramePeriod::from_num_frames(keyframe_interval));

            let encoder = Encoder::with_api_config(OpenH264API::from_source(), config)
                .context("Failed to initialize openh264 encoder")?;
            Ok(Self { encoder })
        }
    }

    impl VideoEncoder for OpenH264Encoder {
        fn encode(&mut self, frame: &RenderedFrame) -> Result<Bytes> {
            let size = (frame.width as usize, frame.height as usize);
            let rgb = RgbSliceU8::new(&frame.data, size);
            let yuv = YUVBuffer::from_rgb_source(rgb);
            let bitstream = self.encoder.encode(&yuv).context("H.264 encode failed")?;
            Ok(Bytes::from(bitstream.to_vec()))
        }
    }

}

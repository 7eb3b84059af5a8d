use crate::media::frame::{DepthFrame, SensorInfo};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DepthSourceError {
    #[error("timed out after {0:?} waiting for a depth frame")]
    Timeout(Duration),

    #[error("sensor is busy")]
    Busy,

    #[error("sensor is not started")]
    NotStarted,

    #[error("unsupported range {requested}; supported ranges: {supported:?}")]
    UnsupportedRange { requested: u32, supported: Vec<u32> },

    #[error("sensor failure: {0}")]
    Device(String),
}

/// Driver for the physical depth sensor.
///
/// Only one consumer drives a source at a time, so every operation takes
/// `&mut self`; [`crate::FrameProducer`] holds the single handle.
#[async_trait]
pub trait DepthSource: Send + Sync {
    async fn open(&mut self) -> Result<(), DepthSourceError>;

    async fn start(&mut self) -> Result<(), DepthSourceError>;

    async fn stop(&mut self);

    async fn close(&mut self);

    /// Waits at most `timeout` for the next capture. `Ok(None)` means the
    /// sensor had nothing to deliver in time.
    async fn request_frame(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<DepthFrame>, DepthSourceError>;

    /// Hands a capture buffer back to the driver.
    async fn release_frame(&mut self, frame: DepthFrame);

    /// Applies a maximum measuring distance and returns the value the sensor
    /// actually uses.
    async fn set_range(&mut self, max_distance: u32) -> Result<u32, DepthSourceError>;

    /// Resolution and device type; `None` until the sensor is started.
    fn info(&self) -> Option<SensorInfo>;
}

use crate::media::depth_source::{DepthSource, DepthSourceError};
use crate::media::frame::{DEFAULT_RESOLUTION, DepthFrame, SensorInfo};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

pub const SUPPORTED_RANGES: [u32; 2] = [2000, 4000];

/// Test-pattern sensor: a gradient that drifts one column per frame.
pub struct SyntheticDepthSource {
    width: u32,
    height: u32,
    frame_period: Duration,
    max_distance: u32,
    opened: bool,
    running: bool,
    sequence: u64,
}

impl SyntheticDepthSource {
    pub fn new() -> Self {
        let (width, height) = DEFAULT_RESOLUTION;
        Self {
            width,
            height,
            frame_period: Duration::from_millis(33),
            max_distance: 4000,
            opened: false,
            running: false,
            sequence: 0,
        }
    }

    pub fn with_frame_period(mut self, period: Duration) -> Self {
        self.frame_period = period;
        self
    }

    fn generate(&mut self) -> DepthFrame {
        let (w, h) = (self.width as usize, self.height as usize);
        let shift = (self.sequence as usize) % w.max(1);
        let span = self.max_distance as f32;
        let mut depth = Vec::with_capacity(w * h);
        for y in 0..h {
            for x in 0..w {
                let column = (x + shift) % w;
                let t = (column as f32 / w as f32 + y as f32 / (2.0 * h as f32)).fract();
                depth.push(t * span);
            }
        }
        let frame = DepthFrame {
            width: self.width,
            height: self.height,
            depth,
            confidence: vec![200; w * h],
            sequence: self.sequence,
        };
        self.sequence += 1;
        frame
    }
}

impl Default for SyntheticDepthSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DepthSource for SyntheticDepthSource {
    async fn open(&mut self) -> Result<(), DepthSourceError> {
        self.opened = true;
        info!("Synthetic depth source opened ({}x{})", self.width, self.height);
        Ok(())
    }

    async fn start(&mut self) -> Result<(), DepthSourceError> {
        if !self.opened {
            return Err(DepthSourceError::Device("source is not open".to_string()));
        }
        self.running = true;
        Ok(())
    }

    async fn stop(&mut self) {
        self.running = false;
    }

    async fn close(&mut self) {
        self.running = false;
        self.opened = false;
        info!("Synthetic depth source closed");
    }

    async fn request_frame(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<DepthFrame>, DepthSourceError> {
        if !self.running {
            return Err(DepthSourceError::NotStarted);
        }
        if self.frame_period > timeout {
            tokio::time::sleep(timeout).await;
            return Err(DepthSourceError::Timeout(timeout));
        }
        tokio::time::sleep(self.frame_period).await;
        Ok(Some(self.generate()))
    }

    async fn release_frame(&mut self, frame: DepthFrame) {
        debug!("Released synthetic frame {}", frame.sequence);
    }

    async fn set_range(&mut self, max_distance: u32) -> Result<u32, DepthSourceError> {
        if !SUPPORTED_RANGES.contains(&max_distance) {
            return Err(DepthSourceError::UnsupportedRange {
                requested: max_distance,
                supported: SUPPORTED_RANGES.to_vec(),
            });
        }
        self.max_distance = max_distance;
        Ok(max_distance)
    }

    fn info(&self) -> Option<SensorInfo> {
        self.running.then(|| SensorInfo {
            width: self.width,
            height: self.height,
            device_type: "synthetic".to_string(),
        })
    }
}

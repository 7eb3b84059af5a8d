use depthcast_core::{Colormap, UnknownColormap};
use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};
use std::time::Duration;

pub const MIN_FPS_LIMIT: u32 = 5;
pub const MAX_FPS_LIMIT: u32 = 30;

/// Values the renderer reads once per production cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderParams {
    pub confidence_threshold: u8,
    pub colormap: Colormap,
    pub max_distance: u32,
}

impl Default for RenderParams {
    fn default() -> Self {
        Self {
            confidence_threshold: 30,
            colormap: Colormap::Rainbow,
            max_distance: 4000,
        }
    }
}

/// Process-wide streaming parameters shared by the producer and the control
/// dispatcher. Each field is updated on its own; there is no grouped update.
#[derive(Debug)]
pub struct RuntimeParams {
    confidence_threshold: AtomicU8,
    colormap: AtomicU8,
    max_distance: AtomicU32,
    fps_limit: AtomicU32,
}

impl RuntimeParams {
    pub fn new(render: RenderParams, fps_limit: u32) -> Self {
        Self {
            confidence_threshold: AtomicU8::new(render.confidence_threshold),
            colormap: AtomicU8::new(render.colormap.index()),
            max_distance: AtomicU32::new(render.max_distance.max(1)),
            fps_limit: AtomicU32::new(fps_limit.clamp(MIN_FPS_LIMIT, MAX_FPS_LIMIT)),
        }
    }

    pub fn snapshot(&self) -> RenderParams {
        RenderParams {
            confidence_threshold: self.confidence_threshold(),
            colormap: self.colormap(),
            max_distance: self.max_distance(),
        }
    }

    pub fn confidence_threshold(&self) -> u8 {
        self.confidence_threshold.load(Ordering::Relaxed)
    }

    pub fn colormap(&self) -> Colormap {
        Colormap::from_index(self.colormap.load(Ordering::Relaxed)).unwrap_or(Colormap::Rainbow)
    }

    pub fn max_distance(&self) -> u32 {
        self.max_distance.load(Ordering::Relaxed)
    }

    pub fn fps_limit(&self) -> u32 {
        self.fps_limit.load(Ordering::Relaxed)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.fps_limit()))
    }

    /// Clamps to `0..=255` and returns the applied threshold.
    pub fn set_confidence_threshold(&self, threshold: i64) -> u8 {
        let applied = threshold.clamp(0, i64::from(u8::MAX)) as u8;
        self.confidence_threshold.store(applied, Ordering::Relaxed);
        applied
    }

    /// Case-insensitive; an unknown name leaves the current colormap in place.
    pub fn set_colormap(&self, name: &str) -> Result<Colormap, UnknownColormap> {
        let colormap: Colormap = name.parse()?;
        self.colormap.store(colormap.index(), Ordering::Relaxed);
        Ok(colormap)
    }

    pub fn set_max_distance(&self, max_distance: u32) {
        self.max_distance.store(max_distance.max(1), Ordering::Relaxed);
    }

    /// Clamps to the supported output rate and returns the applied limit.
    pub fn set_fps_limit(&self, fps: i64) -> u32 {
        let applied = fps.clamp(i64::from(MIN_FPS_LIMIT), i64::from(MAX_FPS_LIMIT)) as u32;
        self.fps_limit.store(applied, Ordering::Relaxed);
        applied
    }
}

impl Default for RuntimeParams {
    fn default() -> Self {
        Self::new(RenderParams::default(), MAX_FPS_LIMIT)
    }
}

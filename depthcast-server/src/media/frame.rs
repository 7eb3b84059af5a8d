use bytes::Bytes;

/// Resolution used for placeholder frames before the sensor reports its own.
pub const DEFAULT_RESOLUTION: (u32, u32) = (240, 180);

/// One raw capture from the depth sensor.
#[derive(Debug, Clone)]
pub struct DepthFrame {
    pub width: u32,
    pub height: u32,
    /// Distance per pixel in millimetres, row-major.
    pub depth: Vec<f32>,
    /// Per-pixel confidence, row-major.
    pub confidence: Vec<u8>,
    pub sequence: u64,
}

impl DepthFrame {
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorInfo {
    pub width: u32,
    pub height: u32,
    pub device_type: String,
}

/// A displayable RGB24 image. Cheap to clone; the pixel buffer is shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFrame {
    pub width: u32,
    pub height: u32,
    pub data: Bytes,
}

impl RenderedFrame {
    pub fn blank(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize * 3;
        Self {
            width,
            height,
            data: Bytes::from(vec![0u8; len]),
        }
    }

    pub fn from_rgb(width: u32, height: u32, rgb: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data: Bytes::from(rgb),
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 3;
        let px = self.data.get(offset..offset + 3)?;
        Some([px[0], px[1], px[2]])
    }

    pub fn is_blank(&self) -> bool {
        self.data.iter().all(|b| *b == 0)
    }
}

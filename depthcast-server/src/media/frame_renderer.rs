use crate::media::frame::{DepthFrame, RenderedFrame};
use crate::media::runtime_params::RenderParams;
use depthcast_core::Colormap;
use tracing::warn;

/// Turns a raw depth capture into a displayable image.
///
/// Implementations must not fail on well-formed input; anything they cannot
/// render becomes a best-effort (possibly black) image instead.
pub trait FrameRenderer: Send + Sync {
    fn render(&self, frame: &DepthFrame, params: &RenderParams) -> RenderedFrame;
}

type Lut = [[u8; 3]; 256];

/// Depth is scaled into `0..=255` against the current range, colored through
/// a lookup table, and masked to black where confidence is too low.
pub struct ColormapRenderer {
    luts: Vec<Lut>,
}

impl ColormapRenderer {
    pub fn new() -> Self {
        Self {
            luts: Colormap::ALL.iter().map(|c| build_lut(*c)).collect(),
        }
    }

    fn lut(&self, colormap: Colormap) -> &Lut {
        &self.luts[colormap.index() as usize]
    }
}

impl Default for ColormapRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameRenderer for ColormapRenderer {
    fn render(&self, frame: &DepthFrame, params: &RenderParams) -> RenderedFrame {
        let pixels = frame.pixel_count();
        if frame.depth.len() != pixels || frame.confidence.len() != pixels {
            warn!(
                "Depth frame {} has {} depth / {} confidence samples for {}x{}",
                frame.sequence,
                frame.depth.len(),
                frame.confidence.len(),
                frame.width,
                frame.height
            );
            return RenderedFrame::blank(frame.width, frame.height);
        }

        let lut = self.lut(params.colormap);
        let scale = 255.0 / params.max_distance.max(1) as f32;
        let mut rgb = Vec::with_capacity(pixels * 3);

        for (depth, confidence) in frame.depth.iter().zip(&frame.confidence) {
            if *confidence < params.confidence_threshold {
                rgb.extend_from_slice(&[0, 0, 0]);
                continue;
            }
            let level = if depth.is_finite() && *depth > 0.0 {
                (depth * scale).min(255.0) as u8
            } else {
                0
            };
            rgb.extend_from_slice(&lut[level as usize]);
        }

        RenderedFrame::from_rgb(frame.width, frame.height, rgb)
    }
}

fn build_lut(colormap: Colormap) -> Lut {
    let mut lut = [[0u8; 3]; 256];
    for (i, entry) in lut.iter_mut().enumerate() {
        let x = i as f32 / 255.0;
        let [r, g, b] = sample(colormap, x);
        *entry = [to_byte(r), to_byte(g), to_byte(b)];
    }
    lut
}

fn to_byte(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn sample(colormap: Colormap, x: f32) -> [f32; 3] {
    match colormap {
        Colormap::Jet => [
            1.5 - (4.0 * x - 3.0).abs(),
            1.5 - (4.0 * x - 2.0).abs(),
            1.5 - (4.0 * x - 1.0).abs(),
        ],
        Colormap::Rainbow => hsv_to_rgb((1.0 - x) * 0.75, 1.0, 1.0),
        Colormap::Hsv => hsv_to_rgb(x, 1.0, 1.0),
        Colormap::Hot => hot(x),
        Colormap::Cool => [x, 1.0 - x, 1.0],
        Colormap::Bone => {
            let [hr, hg, hb] = hot(x);
            [(7.0 * x + hb) / 8.0, (7.0 * x + hg) / 8.0, (7.0 * x + hr) / 8.0]
        }
        Colormap::Turbo => turbo(x),
    }
}

fn hot(x: f32) -> [f32; 3] {
    [3.0 * x, 3.0 * x - 1.0, 3.0 * x - 2.0]
}

// Polynomial fit of the Turbo palette.
fn turbo(x: f32) -> [f32; 3] {
    let r = 0.135_721_38
        + x * (4.615_392_6 + x * (-42.660_324 + x * (132.131_08 + x * (-152.942_4 + x * 59.286_38))));
    let g = 0.091_402_61
        + x * (2.194_188_4 + x * (4.842_966_6 + x * (-14.185_033 + x * (4.277_298_7 + x * 2.829_566))));
    let b = 0.106_673_3
        + x * (12.641_946 + x * (-60.582_05 + x * (110.362_77 + x * (-89.903_11 + x * 27.348_25))));
    [r, g, b]
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [f32; 3] {
    let h = (h.rem_euclid(1.0)) * 6.0;
    let sector = h.floor();
    let f = h - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match sector as u8 {
        0 => [v, t, p],
        1 => [q, v, p],
        2 => [p, v, t],
        3 => [p, q, v],
        4 => [t, p, v],
        _ => [v, p, q],
    }
}

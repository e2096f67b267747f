//! Rendering backend seam and a built-in test-pattern renderer.

use async_trait::async_trait;

use crate::error::VizError;
use crate::protocol::camera::CameraState;
use crate::protocol::range::{DataBounds, RangeQuery};
use crate::stream::types::{PixelBuffer, PixelFormat};

/// Inputs for one rendered frame.
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    pub camera: &'a CameraState,
    pub range: Option<&'a RangeQuery>,
    /// Scene frame (simulation timestep) selected by the display peer.
    pub scene_frame: i32,
}

/// What the backend reports back besides the pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RenderOutput {
    /// Accumulated samples in the target after this call.
    pub samples: u32,
    /// Data extent, when the backend knows it.
    pub bounds: Option<DataBounds>,
}

/// Anything that turns a camera into pixels.
///
/// `target` always has the negotiated resolution and format; the backend
/// overwrites it completely.
#[async_trait]
pub trait RenderBackend: Send {
    async fn render(
        &mut self,
        request: RenderRequest<'_>,
        target: &mut PixelBuffer,
    ) -> Result<RenderOutput, VizError>;

    /// Drop accumulated samples; the next frame starts from scratch.
    fn reset(&mut self);

    /// Opaque settings forwarded from the display peer.
    fn apply_render_data(&mut self, _data: &[u8]) {}
}

// ── TestPatternBackend ───────────────────────────────────────────

/// Deterministic, camera-dependent gradient with progressive refinement.
///
/// Brightness ramps up over `max_samples` calls and restarts on
/// [`reset`](RenderBackend::reset), mimicking an accumulating path tracer.
/// Pixels whose world position is rejected by the range query are black.
#[derive(Debug, Clone)]
pub struct TestPatternBackend {
    samples: u32,
    max_samples: u32,
    bounds: DataBounds,
    /// First byte of the last render-data blob, used as a tint.
    tint: u8,
}

impl TestPatternBackend {
    pub fn new(max_samples: u32) -> Self {
        Self {
            samples: 0,
            max_samples: max_samples.max(1),
            bounds: DataBounds {
                lower: [-1.0; 3],
                upper: [1.0; 3],
                scalar_range: [0.0, 1.0],
            },
            tint: 0,
        }
    }

    pub fn with_bounds(mut self, bounds: DataBounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn samples(&self) -> u32 {
        self.samples
    }

    fn shade(&self, request: &RenderRequest<'_>, u: f32, v: f32) -> [f32; 4] {
        let b = &self.bounds;
        let point = [
            b.lower[0] + (b.upper[0] - b.lower[0]) * u,
            b.lower[1] + (b.upper[1] - b.lower[1]) * v,
            (b.lower[2] + b.upper[2]) * 0.5,
        ];
        if let Some(range) = request.range {
            if !range.selects(point) {
                return [0.0, 0.0, 0.0, 1.0];
            }
        }

        let [cx, cy, cz] = request.camera.position();
        let phase = request.scene_frame as f32 * 0.1;
        let scalar = 0.5 + 0.5 * ((u * 6.0 + cx + phase).sin() * (v * 6.0 + cy).cos());
        if let Some(range) = request.range {
            if !range.keeps_value(scalar) {
                return [0.0, 0.0, 0.0, 1.0];
            }
        }

        let progress = self.samples as f32 / self.max_samples as f32;
        let depth = 1.0 / (1.0 + cz.abs() * 0.1);
        [
            scalar * progress,
            (u * depth + self.tint as f32 / 255.0).min(1.0) * progress,
            v * depth * progress,
            1.0,
        ]
    }
}

impl Default for TestPatternBackend {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl RenderBackend for TestPatternBackend {
    async fn render(
        &mut self,
        request: RenderRequest<'_>,
        target: &mut PixelBuffer,
    ) -> Result<RenderOutput, VizError> {
        request.camera.validate()?;
        if self.samples < self.max_samples {
            self.samples += 1;
        }

        let (width, height) = target.dimensions();
        let format = target.format();
        let bpp = format.bytes_per_pixel();
        let inv_w = 1.0 / width as f32;
        let inv_h = 1.0 / height as f32;

        for (i, px) in target.data_mut().chunks_exact_mut(bpp).enumerate() {
            let x = (i % width as usize) as f32;
            let y = (i / width as usize) as f32;
            let rgba = self.shade(&request, (x + 0.5) * inv_w, (y + 0.5) * inv_h);
            write_pixel(px, format, rgba);
        }

        Ok(RenderOutput {
            samples: self.samples,
            bounds: Some(self.bounds),
        })
    }

    fn reset(&mut self) {
        self.samples = 0;
    }

    fn apply_render_data(&mut self, data: &[u8]) {
        self.tint = data.first().copied().unwrap_or(0);
    }
}

fn write_pixel(px: &mut [u8], format: PixelFormat, rgba: [f32; 4]) {
    match format {
        PixelFormat::Rgba8 => {
            for (dst, c) in px.iter_mut().zip(rgba) {
                *dst = (c.clamp(0.0, 1.0) * 255.0 + 0.5) as u8;
            }
        }
        PixelFormat::Rgba16F => {
            for (dst, c) in px.chunks_exact_mut(2).zip(rgba) {
                dst.copy_from_slice(&half_bits(c).to_le_bytes());
            }
        }
        PixelFormat::Rgba32F => {
            for (dst, c) in px.chunks_exact_mut(4).zip(rgba) {
                dst.copy_from_slice(&c.to_le_bytes());
            }
        }
    }
}

/// IEEE 754 binary16 bits for `v`. Subnormals flush to zero, overflow
/// saturates to infinity.
fn half_bits(v: f32) -> u16 {
    let bits = v.to_bits();
    let sign = ((bits >> 16) & 0x8000) as u16;
    let exp = ((bits >> 23) & 0xff) as i32 - 127 + 15;
    let mantissa = bits & 0x007f_ffff;
    if exp <= 0 {
        return sign;
    }
    if exp >= 0x1f {
        return sign | 0x7c00;
    }
    sign | ((exp as u16) << 10) | ((mantissa >> 13) as u16)
}

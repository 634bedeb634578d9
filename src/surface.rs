//! The rendering-surface boundary.
//!
//! The skeletal renderer is host-supplied; the capture pipeline only needs a
//! source of RGBA frames at a given size. [`SolidSurface`] is the built-in
//! stand-in: flat background plus the placement-transformed model box shaded
//! by animation phase, enough to drive the pipeline end to end.

use crate::foundation::core::{Canvas, FrameIndex, Fps, Millis};
use crate::foundation::error::{StagecastError, StagecastResult};
use crate::model::ModelAsset;
use crate::placement::Placement;

/// A rendered frame as RGBA8 pixels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRGBA {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
    /// Whether the `data` is premultiplied alpha.
    pub premultiplied: bool,
}

/// What an off-screen (or preview) surface is opened with.
#[derive(Clone, Debug)]
pub struct SurfaceSpec {
    pub canvas: Canvas,
    pub fps: Fps,
    /// Animation running on the surface.
    pub animation: String,
    pub skin: Option<String>,
    pub looping: bool,
    pub placement: Placement,
    /// Native duration of `animation`, when the asset reports one.
    pub animation_duration: Option<Millis>,
}

/// Produces frames for an opened surface.
pub trait FrameSource {
    /// Render the frame at `index`. Indices arrive in strictly increasing
    /// order within one capture.
    fn frame_at(&mut self, index: FrameIndex) -> StagecastResult<FrameRGBA>;
}

/// Opens surfaces for a loaded model.
pub trait SurfaceBackend {
    fn open(&mut self, model: &ModelAsset, spec: &SurfaceSpec) -> StagecastResult<Box<dyn FrameSource>>;
}

/// Built-in procedural surface backend.
#[derive(Clone, Copy, Debug)]
pub struct SolidSurfaceBackend {
    /// Background color, RGBA8.
    pub background: [u8; 4],
}

impl Default for SolidSurfaceBackend {
    fn default() -> Self {
        Self {
            background: [18, 20, 28, 255],
        }
    }
}

impl SurfaceBackend for SolidSurfaceBackend {
    fn open(&mut self, model: &ModelAsset, spec: &SurfaceSpec) -> StagecastResult<Box<dyn FrameSource>> {
        if spec.canvas.width == 0 || spec.canvas.height == 0 {
            return Err(StagecastError::validation("surface width/height must be non-zero"));
        }
        Ok(Box::new(SolidSurface {
            spec: spec.clone(),
            background: self.background,
            model_width: model.width,
            model_height: model.height,
        }))
    }
}

struct SolidSurface {
    spec: SurfaceSpec,
    background: [u8; 4],
    model_width: f64,
    model_height: f64,
}

impl FrameSource for SolidSurface {
    fn frame_at(&mut self, index: FrameIndex) -> StagecastResult<FrameRGBA> {
        let canvas = self.spec.canvas;
        let mut data = vec![0u8; (canvas.width as usize) * (canvas.height as usize) * 4];
        for px in data.chunks_exact_mut(4) {
            px.copy_from_slice(&self.background);
        }

        let t_ms = self.spec.fps.frame_offset_ms(index.0);
        let phase = match self.spec.animation_duration {
            Some(d) if d.0 > 0 => {
                if self.spec.looping {
                    (t_ms % d.0) as f64 / d.0 as f64
                } else {
                    t_ms.min(d.0) as f64 / d.0 as f64
                }
            }
            _ => 0.0,
        };
        let shade = 64 + (phase * 160.0) as u8;
        let fill = [shade, 96, 255 - shade, 255];

        let p = self.spec.placement;
        let x0 = p.translate.x.max(0.0) as u32;
        let y0 = p.translate.y.max(0.0) as u32;
        let x1 = ((p.translate.x + self.model_width * p.scale).max(0.0) as u32).min(canvas.width);
        let y1 = ((p.translate.y + self.model_height * p.scale).max(0.0) as u32).min(canvas.height);

        for y in y0..y1 {
            let row = (y as usize) * (canvas.width as usize) * 4;
            for x in x0..x1 {
                let i = row + (x as usize) * 4;
                data[i..i + 4].copy_from_slice(&fill);
            }
        }

        Ok(FrameRGBA {
            width: canvas.width,
            height: canvas.height,
            data,
            premultiplied: true,
        })
    }
}

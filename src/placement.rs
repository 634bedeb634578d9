//! Fit-to-frame placement.
//!
//! The export surface re-runs the same scaling transform the on-screen stage
//! uses, so exported framing matches the editor preview: uniform scale is
//! surface width over model native width, and the model box is anchored from
//! the centered position by its scaled size minus a fixed bottom-right inset.

use kurbo::{Affine, Vec2};

use crate::foundation::core::Canvas;
use crate::foundation::error::{StagecastError, StagecastResult};

/// Fixed pixel inset pulling the anchored model box back from the
/// bottom-right of the surface.
pub const BOTTOM_RIGHT_INSET: Vec2 = Vec2::new(950.0, 100.0);

/// A resolved surface placement: uniform scale plus the top-left position of
/// the scaled model box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    pub scale: f64,
    pub translate: Vec2,
}

impl Placement {
    /// Model-space to surface-space transform (scale first, then translate).
    pub fn to_affine(&self) -> Affine {
        Affine::translate(self.translate) * Affine::scale(self.scale)
    }
}

/// Compute the placement for a model of native size `model_width` x
/// `model_height` on `canvas`.
pub fn fit_to_frame(canvas: Canvas, model_width: f64, model_height: f64) -> StagecastResult<Placement> {
    if canvas.width == 0 || canvas.height == 0 {
        return Err(StagecastError::validation("surface width/height must be non-zero"));
    }
    if !(model_width.is_finite() && model_width > 0.0)
        || !(model_height.is_finite() && model_height > 0.0)
    {
        return Err(StagecastError::validation(
            "model dimensions must be positive and finite",
        ));
    }

    let scale = f64::from(canvas.width) / model_width;
    let scaled = Vec2::new(model_width * scale, model_height * scale);
    let centered = Vec2::new(
        (f64::from(canvas.width) - scaled.x) / 2.0,
        (f64::from(canvas.height) - scaled.y) / 2.0,
    );
    let translate = centered + scaled - BOTTOM_RIGHT_INSET;

    Ok(Placement { scale, translate })
}

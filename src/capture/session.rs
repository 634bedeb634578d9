//! Capture sessions and artifact assembly.

use crate::capture::recorder::{MediaChunk, Recorder};
use crate::foundation::core::{Fps, Millis};
use crate::foundation::error::{StagecastError, StagecastResult};
use crate::sequencer::Sequencer;
use crate::surface::FrameSource;

/// Identifies one export in flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CaptureId(pub u64);

/// Export parameters, mirroring the export form.
#[derive(Clone, Debug)]
pub struct ExportConfig {
    pub width: u32,
    pub height: u32,
    pub bitrate_bps: u32,
    /// Explicit capture length; when absent, the selected animation's native
    /// duration applies.
    pub duration_secs: Option<f64>,
    pub frame_rate: Fps,
    /// Caller-provided container format string.
    pub format: String,
}

impl ExportConfig {
    /// Config with the form's defaults: 5 Mbps, 60 fps, WebM.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bitrate_bps: 5_000_000,
            duration_secs: None,
            frame_rate: Fps { num: 60, den: 1 },
            format: "video/webm".to_owned(),
        }
    }

    pub fn validate(&self) -> StagecastResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(StagecastError::validation("export width/height must be non-zero"));
        }
        if self.bitrate_bps == 0 {
            return Err(StagecastError::validation("export bitrate must be non-zero"));
        }
        if self.frame_rate.num == 0 || self.frame_rate.den == 0 {
            return Err(StagecastError::validation("export frame rate must be non-zero"));
        }
        if self.format.trim().is_empty() {
            return Err(StagecastError::validation("export format must be non-empty"));
        }
        if let Some(secs) = self.duration_secs
            && !(secs.is_finite() && secs >= 0.0)
        {
            return Err(StagecastError::validation(
                "export duration must be finite and non-negative",
            ));
        }
        Ok(())
    }
}

/// Capture length: explicit config wins, then the animation's native
/// duration, then zero (stop immediately).
pub(crate) fn resolve_capture_duration(
    explicit_secs: Option<f64>,
    native: Option<Millis>,
) -> Millis {
    match explicit_secs {
        Some(secs) => Millis::from_secs_f64(secs),
        None => native.unwrap_or(Millis::ZERO),
    }
}

/// The finished export: the concatenated container bytes plus capture stats.
#[derive(Clone, Debug)]
pub struct Artifact {
    pub format: String,
    pub data: Vec<u8>,
    pub frames: u64,
    pub duration: Millis,
}

/// One export in flight. Created when the export is requested, destroyed
/// when the recorder stops and the artifact is assembled.
pub(crate) struct CaptureSession {
    pub(crate) id: CaptureId,
    pub(crate) format: String,
    pub(crate) frame_rate: Fps,
    pub(crate) recorder: Box<dyn Recorder>,
    pub(crate) surface: Box<dyn FrameSource>,
    pub(crate) sequencer: Sequencer,
    /// Collected strictly in emission order.
    pub(crate) chunks: Vec<MediaChunk>,
    pub(crate) frames_pushed: u64,
    pub(crate) started_at: Millis,
    pub(crate) stop_at: Millis,
}

impl CaptureSession {
    pub(crate) fn collect(&mut self, chunks: Vec<MediaChunk>) {
        self.chunks.extend(chunks);
    }

    /// Concatenate the collected chunks, in emission order, into the final
    /// artifact.
    pub(crate) fn assemble(self) -> Artifact {
        let mut data = Vec::with_capacity(self.chunks.iter().map(|c| c.data.len()).sum());
        for chunk in &self.chunks {
            data.extend_from_slice(&chunk.data);
        }
        Artifact {
            format: self.format,
            data,
            frames: self.frames_pushed,
            duration: self.stop_at.saturating_sub(self.started_at),
        }
    }
}

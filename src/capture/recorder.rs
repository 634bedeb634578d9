//! The recorder boundary.
//!
//! A recorder consumes surface frames (in strictly increasing order) and
//! optionally routed audio clips, and emits the encoded container as an
//! ordered series of [`MediaChunk`]s. Chunks are collected in emission order
//! and concatenated in that same order to form the artifact; reordering
//! corrupts the output.

use crate::foundation::core::{FrameIndex, Fps, Millis};
use crate::foundation::error::{StagecastError, StagecastResult};
use crate::playlist::Clip;
use crate::surface::FrameRGBA;

/// Parameters a recorder is opened with.
#[derive(Clone, Debug)]
pub struct RecorderSpec {
    pub width: u32,
    pub height: u32,
    pub fps: Fps,
    pub bitrate_bps: u32,
    /// Caller-provided container format string (e.g. `video/webm`).
    pub format: String,
}

impl RecorderSpec {
    pub fn validate(&self) -> StagecastResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(StagecastError::validation(
                "recorder width/height must be non-zero",
            ));
        }
        if self.bitrate_bps == 0 {
            return Err(StagecastError::validation("recorder bitrate must be non-zero"));
        }
        if self.format.trim().is_empty() {
            return Err(StagecastError::validation("recorder format must be non-empty"));
        }
        Ok(())
    }
}

/// One binary fragment of the encoded output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaChunk {
    pub data: Vec<u8>,
}

/// Records one capture session.
pub trait Recorder {
    /// Called once before any frames are pushed.
    fn begin(&mut self) -> StagecastResult<()>;

    /// Push one frame in strictly increasing index order.
    fn push_frame(&mut self, index: FrameIndex, frame: &FrameRGBA) -> StagecastResult<()>;

    /// Route a started audio clip into the recording's audio track, at the
    /// given offset from the start of the capture.
    fn route_clip(&mut self, clip: &Clip, at: Millis) -> StagecastResult<()>;

    /// Drain chunks emitted since the last poll.
    fn poll_chunks(&mut self) -> Vec<MediaChunk>;

    /// Stop recording and return any final chunks.
    fn finish(&mut self) -> StagecastResult<Vec<MediaChunk>>;
}

/// Opens recorders; unsupported formats fail here, visibly.
pub trait RecorderBackend {
    fn open(&mut self, spec: &RecorderSpec) -> StagecastResult<Box<dyn Recorder>>;
}

/// In-memory recorder for tests and debugging.
///
/// Emits a readable transcript as chunk data: `B;` on begin, `F<idx>;` per
/// frame, `A<url>@<ms>;` per routed clip, `E;` on finish. Concatenating the
/// chunks therefore reproduces the exact emission order.
#[derive(Debug, Default)]
pub struct InMemoryRecorder {
    started: bool,
    finished: bool,
    last_index: Option<FrameIndex>,
    buffer: Vec<MediaChunk>,
}

impl InMemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn emit(&mut self, data: impl Into<Vec<u8>>) {
        self.buffer.push(MediaChunk { data: data.into() });
    }
}

impl Recorder for InMemoryRecorder {
    fn begin(&mut self) -> StagecastResult<()> {
        if self.started {
            return Err(StagecastError::capture("recorder already started"));
        }
        self.started = true;
        self.emit(&b"B;"[..]);
        Ok(())
    }

    fn push_frame(&mut self, index: FrameIndex, _frame: &FrameRGBA) -> StagecastResult<()> {
        if !self.started || self.finished {
            return Err(StagecastError::capture("recorder not recording"));
        }
        if let Some(last) = self.last_index
            && index.0 <= last.0
        {
            return Err(StagecastError::capture(
                "recorder received out-of-order frame index",
            ));
        }
        self.last_index = Some(index);
        self.emit(format!("F{};", index.0).into_bytes());
        Ok(())
    }

    fn route_clip(&mut self, clip: &Clip, at: Millis) -> StagecastResult<()> {
        if !self.started || self.finished {
            return Err(StagecastError::capture("recorder not recording"));
        }
        self.emit(format!("A{}@{};", clip.url, at.0).into_bytes());
        Ok(())
    }

    fn poll_chunks(&mut self) -> Vec<MediaChunk> {
        std::mem::take(&mut self.buffer)
    }

    fn finish(&mut self) -> StagecastResult<Vec<MediaChunk>> {
        if !self.started {
            return Err(StagecastError::capture("recorder was never started"));
        }
        if self.finished {
            return Err(StagecastError::capture("recorder already finished"));
        }
        self.finished = true;
        self.emit(&b"E;"[..]);
        Ok(std::mem::take(&mut self.buffer))
    }
}

/// Backend producing [`InMemoryRecorder`]s.
#[derive(Clone, Copy, Debug, Default)]
pub struct InMemoryRecorderBackend;

impl RecorderBackend for InMemoryRecorderBackend {
    fn open(&mut self, spec: &RecorderSpec) -> StagecastResult<Box<dyn Recorder>> {
        spec.validate()?;
        Ok(Box::new(InMemoryRecorder::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> FrameRGBA {
        FrameRGBA {
            width: 2,
            height: 2,
            data: vec![0; 16],
            premultiplied: true,
        }
    }

    fn spec() -> RecorderSpec {
        RecorderSpec {
            width: 2,
            height: 2,
            fps: Fps::new(10, 1).unwrap(),
            bitrate_bps: 1_000_000,
            format: "video/webm".to_owned(),
        }
    }

    #[test]
    fn spec_validation_catches_bad_values() {
        let mut s = spec();
        s.width = 0;
        assert!(s.validate().is_err());

        let mut s = spec();
        s.bitrate_bps = 0;
        assert!(s.validate().is_err());

        let mut s = spec();
        s.format = " ".to_owned();
        assert!(s.validate().is_err());

        assert!(spec().validate().is_ok());
    }

    #[test]
    fn chunks_record_emission_order() {
        let mut r = InMemoryRecorderBackend.open(&spec()).unwrap();
        r.begin().unwrap();
        r.route_clip(
            &Clip {
                url: "hero_talk_1.ogg".to_owned(),
            },
            Millis(0),
        )
        .unwrap();
        r.push_frame(FrameIndex(0), &frame()).unwrap();
        r.push_frame(FrameIndex(1), &frame()).unwrap();
        let mut chunks = r.poll_chunks();
        chunks.extend(r.finish().unwrap());

        let assembled: Vec<u8> = chunks.into_iter().flat_map(|c| c.data).collect();
        assert_eq!(
            String::from_utf8(assembled).unwrap(),
            "B;Ahero_talk_1.ogg@0;F0;F1;E;"
        );
    }

    #[test]
    fn out_of_order_frames_are_rejected() {
        let mut r = InMemoryRecorder::new();
        r.begin().unwrap();
        r.push_frame(FrameIndex(3), &frame()).unwrap();
        assert!(r.push_frame(FrameIndex(3), &frame()).is_err());
        assert!(r.push_frame(FrameIndex(2), &frame()).is_err());
    }

    #[test]
    fn lifecycle_is_enforced() {
        let mut r = InMemoryRecorder::new();
        assert!(r.push_frame(FrameIndex(0), &frame()).is_err());
        assert!(r.finish().is_err());
        r.begin().unwrap();
        assert!(r.begin().is_err());
        r.finish().unwrap();
        assert!(r.finish().is_err());
    }
}

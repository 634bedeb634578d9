//! Capture pipeline: recorders, capture sessions, artifact assembly.

pub mod ffmpeg;
pub mod recorder;
pub mod session;

pub use crate::capture::ffmpeg::{FfmpegRecorderBackend, is_ffmpeg_on_path};
pub use crate::capture::recorder::{
    InMemoryRecorder, InMemoryRecorderBackend, MediaChunk, Recorder, RecorderBackend, RecorderSpec,
};
pub use crate::capture::session::{Artifact, CaptureId, ExportConfig};

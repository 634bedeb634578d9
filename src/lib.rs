//! Stagecast is the core of a character-animation viewer and exporter.
//!
//! It owns the pieces with real sequencing semantics (voice-line playlists,
//! caption lifetimes, intro triggers, the capture window of an export),
//! while rendering, audio output and container encoding live behind backend
//! traits the host implements. Execution is single-threaded and
//! deterministic: every suspension point is a deadline on an explicit timer
//! queue driven by a virtual clock.
//!
//! The public API is session-oriented:
//!
//! - Load content tables into a [`ContentPack`]
//! - Create a [`ViewerSession`] over a set of [`Backends`]
//! - Load models, select animations/skins, export with [`ExportConfig`]
//! - Drive the clock with `run_until_idle` / `run_until`
#![forbid(unsafe_code)]

pub mod audio;
pub mod captions;
pub mod capture;
pub mod catalog;
pub mod diag;
mod foundation;
pub mod model;
pub mod placement;
pub mod playlist;
pub mod router;
mod runtime;
pub mod sequencer;
pub mod session;
pub mod surface;

pub use crate::foundation::core::{Canvas, Fps, FrameIndex, Millis};
pub use crate::foundation::error::{StagecastError, StagecastResult};

pub use crate::audio::{AudioPlayer, ClipStarted, FfprobeAudioPlayer, SilentAudioPlayer};
pub use crate::capture::{
    Artifact, CaptureId, ExportConfig, FfmpegRecorderBackend, InMemoryRecorder,
    InMemoryRecorderBackend, MediaChunk, Recorder, RecorderBackend, RecorderSpec,
};
pub use crate::captions::{Caption, CaptionId};
pub use crate::catalog::{
    AudioMap, ContentPack, DialogRecord, DialogTable, IntroSpec, ModelEntry, RenameEntry,
    RenameTable,
};
pub use crate::diag::DiagEvent;
pub use crate::model::{AnimationInfo, JsonModelLoader, ModelAsset, ModelLoader};
pub use crate::placement::{Placement, fit_to_frame};
pub use crate::playlist::{Clip, Playlist};
pub use crate::router::TriggerRouter;
pub use crate::sequencer::{SETTLE_DELAY, SeqSlot, SeqState};
pub use crate::session::{
    Backends, DEFAULT_ANIMATION, LoadedModel, ModelListing, ViewerSession, ViewerSessionOpts,
};
pub use crate::surface::{
    FrameRGBA, FrameSource, SolidSurfaceBackend, SurfaceBackend, SurfaceSpec,
};

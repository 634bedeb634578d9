//! The viewer session.
//!
//! `ViewerSession` is the explicit session object the rest of the crate hangs
//! off: it owns the content tables, the backend boundaries, the timer queue
//! and virtual clock, the on-screen sequencer, the caption board, and every
//! capture in flight. There is no global state; "the current model" is a
//! field reassigned synchronously on each load.

use std::collections::BTreeMap;

use crate::audio::AudioPlayer;
use crate::capture::recorder::RecorderSpec;
use crate::capture::session::{CaptureSession, resolve_capture_duration};
use crate::capture::{Artifact, CaptureId, ExportConfig, RecorderBackend};
use crate::captions::{Caption, CaptionBoard};
use crate::catalog::{ContentPack, IntroSpec, ModelEntry, RenameTable};
use crate::diag::{DiagEvent, DiagLog};
use crate::foundation::core::{Canvas, FrameIndex, Fps, Millis};
use crate::foundation::error::{StagecastError, StagecastResult};
use crate::model::{ModelAsset, ModelLoader};
use crate::placement::fit_to_frame;
use crate::playlist::Playlist;
use crate::router::TriggerRouter;
use crate::runtime::{Event, TimerQueue};
use crate::sequencer::{SETTLE_DELAY, SeqCtx, SeqEvent, SeqSlot, SeqState, Sequencer};
use crate::surface::{FrameSource, SurfaceBackend, SurfaceSpec};

/// Animation selected automatically when a model finishes loading.
pub const DEFAULT_ANIMATION: &str = "Idle_01";

/// Bounds the model-specific intro delay.
pub const INTRO_DELAY_MIN: Millis = Millis(1000);
pub const INTRO_DELAY_MAX: Millis = Millis(5000);

const PREVIEW_FPS: Fps = Fps { num: 60, den: 1 };

/// Options controlling session behavior.
#[derive(Clone, Copy, Debug)]
pub struct ViewerSessionOpts {
    /// Pause inserted between consecutive clips of a sequence.
    pub settle_delay: Millis,
}

impl Default for ViewerSessionOpts {
    fn default() -> Self {
        Self {
            settle_delay: SETTLE_DELAY,
        }
    }
}

/// The host-supplied boundaries a session runs against.
pub struct Backends {
    pub loader: Box<dyn ModelLoader>,
    pub audio: Box<dyn AudioPlayer>,
    pub surfaces: Box<dyn SurfaceBackend>,
    pub recorders: Box<dyn RecorderBackend>,
}

/// A catalog row resolved for display.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelListing {
    pub name: String,
    pub display_name: String,
    pub url: String,
}

/// The currently loaded model and its viewer-side selection state.
#[derive(Clone, Debug)]
pub struct LoadedModel {
    pub asset: ModelAsset,
    /// Internal catalog name; dialog lookups key on this.
    pub name: String,
    pub display_name: String,
    pub audio_prefix: String,
    pub selected_animation: Option<String>,
    pub selected_skin: Option<String>,
}

pub struct ViewerSession {
    opts: ViewerSessionOpts,
    models: Vec<ModelEntry>,
    renames: RenameTable,
    router: TriggerRouter,

    loader: Box<dyn ModelLoader>,
    audio: Box<dyn AudioPlayer>,
    surfaces: Box<dyn SurfaceBackend>,
    recorders: Box<dyn RecorderBackend>,

    timers: TimerQueue<Event>,
    now: Millis,

    model: Option<LoadedModel>,
    loop_animation: bool,
    ui_seq: Sequencer,
    captions: CaptionBoard,

    captures: BTreeMap<CaptureId, CaptureSession>,
    next_capture_id: u64,
    artifacts: Vec<Artifact>,

    diag: DiagLog,
}

impl ViewerSession {
    pub fn new(content: ContentPack, backends: Backends, opts: ViewerSessionOpts) -> Self {
        let ContentPack {
            models,
            renames,
            dialogs,
            audio,
        } = content;
        Self {
            opts,
            models,
            renames,
            router: TriggerRouter::new(audio, dialogs),
            loader: backends.loader,
            audio: backends.audio,
            surfaces: backends.surfaces,
            recorders: backends.recorders,
            timers: TimerQueue::new(),
            now: Millis::ZERO,
            model: None,
            loop_animation: true,
            ui_seq: Sequencer::new(SeqSlot::Ui, opts.settle_delay),
            captions: CaptionBoard::new(),
            captures: BTreeMap::new(),
            next_capture_id: 0,
            artifacts: Vec::new(),
            diag: DiagLog::new(),
        }
    }

    /// Current virtual-clock time.
    pub fn now(&self) -> Millis {
        self.now
    }

    /// True when nothing is scheduled: no sequence, caption, intro or
    /// capture has a pending wakeup.
    pub fn is_idle(&self) -> bool {
        self.timers.is_empty()
    }

    /// Number of scheduled wakeups still pending.
    pub fn pending_events(&self) -> usize {
        self.timers.len()
    }

    /// Catalog rows with display-name remapping applied.
    pub fn models(&self) -> Vec<ModelListing> {
        self.models
            .iter()
            .map(|e| ModelListing {
                name: e.name.clone(),
                display_name: self.renames.display_name(&e.name),
                url: e.url.clone(),
            })
            .collect()
    }

    pub fn model(&self) -> Option<&LoadedModel> {
        self.model.as_ref()
    }

    pub fn diagnostics(&self) -> &[DiagEvent] {
        self.diag.events()
    }

    pub fn visible_captions(&self) -> &[Caption] {
        self.captions.visible()
    }

    pub fn ui_playback_state(&self) -> SeqState {
        self.ui_seq.state()
    }

    pub fn captures_in_flight(&self) -> usize {
        self.captures.len()
    }

    /// Finished export artifacts, oldest first.
    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    pub fn take_artifacts(&mut self) -> Vec<Artifact> {
        std::mem::take(&mut self.artifacts)
    }

    pub fn loop_enabled(&self) -> bool {
        self.loop_animation
    }

    pub fn set_loop(&mut self, looping: bool) {
        self.loop_animation = looping;
    }

    /// Load a catalog model and make it current. A previously running
    /// sequence, caption or capture is deliberately left in flight.
    #[tracing::instrument(skip(self))]
    pub fn load_model(&mut self, name: &str) -> StagecastResult<()> {
        let entry = self
            .models
            .iter()
            .find(|m| m.name == name)
            .cloned()
            .ok_or_else(|| StagecastError::validation(format!("unknown model '{name}'")))?;
        entry.validate()?;

        let asset = self.loader.load(&entry.url).map_err(|e| {
            tracing::warn!(model = %entry.name, error = %e, "model load failed");
            e
        })?;
        asset.validate()?;

        let display_name = self.renames.display_name(&entry.name);
        let audio_prefix = self.renames.audio_prefix(&entry.name);
        let selected_animation = pick_default_animation(&asset);

        if let Some(intro) = &entry.intro {
            self.schedule_intro(&entry, &audio_prefix, intro);
        }

        self.model = Some(LoadedModel {
            asset,
            name: entry.name.clone(),
            display_name,
            audio_prefix,
            selected_animation,
            selected_skin: None,
        });
        self.diag.note(DiagEvent::ModelLoaded {
            model: entry.name,
            at: self.now,
        });
        Ok(())
    }

    fn schedule_intro(&mut self, entry: &ModelEntry, audio_prefix: &str, intro: &IntroSpec) {
        let delay = Millis(intro.delay_ms.clamp(INTRO_DELAY_MIN.0, INTRO_DELAY_MAX.0));
        // Built now, so a later model switch cannot retarget it.
        let playlist = Playlist::intro(audio_prefix, &intro.scene, intro.clips);
        let at = self.now + delay;
        self.timers.schedule_at(at, Event::IntroDue { playlist });
        self.diag.note(DiagEvent::IntroScheduled {
            model: entry.name.clone(),
            due: at,
        });
    }

    /// Handle an animation trigger: remember the selection, start any mapped
    /// audio playlist, and show any matching caption. Audio and caption are
    /// independent; every lookup miss is a silent no-op.
    pub fn select_animation(&mut self, animation: &str) {
        let Some(model) = self.model.as_mut() else {
            tracing::debug!(animation, "animation selected with no model loaded");
            return;
        };
        if model.asset.animation(animation).is_some() {
            model.selected_animation = Some(animation.to_owned());
        } else {
            tracing::debug!(animation, "animation not present in loaded asset");
        }
        let audio_prefix = model.audio_prefix.clone();
        let model_name = model.name.clone();

        if let Some(playlist) = self.router.playlist_for(&audio_prefix, animation) {
            self.play_ui(playlist);
        } else {
            tracing::debug!(animation, "no audio mapped for animation");
        }

        if let Some(record) = self.router.dialog_for(&model_name, animation) {
            let record = record.clone();
            self.show_caption(record.text, Millis(record.display_ms));
        } else {
            tracing::debug!(animation, model = %model_name, "no dialog entry for animation");
        }
    }

    /// Select a skin reported by the loaded asset; unknown skins are a
    /// logged no-op.
    pub fn select_skin(&mut self, skin: &str) {
        let Some(model) = self.model.as_mut() else {
            return;
        };
        if model.asset.has_skin(skin) {
            model.selected_skin = Some(skin.to_owned());
        } else {
            tracing::debug!(skin, "skin not present in loaded asset");
        }
    }

    /// Open a surface matching the on-screen stage for the current model and
    /// selection, using the same fit-to-frame transform exports use.
    pub fn preview_surface(&mut self, canvas: Canvas) -> StagecastResult<Box<dyn FrameSource>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| StagecastError::validation("no model is loaded"))?;
        let animation = model
            .selected_animation
            .clone()
            .ok_or_else(|| StagecastError::validation("no animation is selected"))?;
        let placement = fit_to_frame(canvas, model.asset.width, model.asset.height)?;
        let spec = SurfaceSpec {
            canvas,
            fps: PREVIEW_FPS,
            animation: animation.clone(),
            skin: model.selected_skin.clone(),
            looping: self.loop_animation,
            placement,
            animation_duration: model.asset.animation_duration(&animation),
        };
        self.surfaces.open(&model.asset, &spec)
    }

    /// Export the current view to a video artifact.
    ///
    /// Fails fast, before any surface or recorder exists, when no model is
    /// loaded. Recorder/format problems surface as `Capture` errors rather
    /// than a silent hang. The returned id matches the artifact produced once
    /// the recording window closes.
    #[tracing::instrument(skip(self, cfg))]
    pub fn export_current_view(&mut self, cfg: ExportConfig) -> StagecastResult<CaptureId> {
        cfg.validate()?;
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| StagecastError::validation("no model is loaded"))?;
        let animation = model
            .selected_animation
            .clone()
            .ok_or_else(|| StagecastError::validation("no animation is selected"))?;

        let canvas = Canvas {
            width: cfg.width,
            height: cfg.height,
        };
        let placement = fit_to_frame(canvas, model.asset.width, model.asset.height)?;
        let native = model.asset.animation_duration(&animation);
        let surface_spec = SurfaceSpec {
            canvas,
            fps: cfg.frame_rate,
            animation: animation.clone(),
            skin: model.selected_skin.clone(),
            looping: true,
            placement,
            animation_duration: native,
        };
        let surface = self.surfaces.open(&model.asset, &surface_spec)?;

        let recorder_spec = RecorderSpec {
            width: cfg.width,
            height: cfg.height,
            fps: cfg.frame_rate,
            bitrate_bps: cfg.bitrate_bps,
            format: cfg.format.clone(),
        };
        let mut recorder = self.recorders.open(&recorder_spec)?;
        recorder.begin()?;

        let duration = resolve_capture_duration(cfg.duration_secs, native);
        let id = CaptureId(self.next_capture_id);
        self.next_capture_id += 1;

        let audio_prefix = model.audio_prefix.clone();
        let playlist = self.router.playlist_for(&audio_prefix, &animation);
        if playlist.is_none() {
            tracing::debug!(%animation, "no audio mapped; capturing video only");
        }

        self.diag.note(DiagEvent::CaptureStarted {
            id,
            duration,
            at: self.now,
        });

        let mut cap = CaptureSession {
            id,
            format: cfg.format.clone(),
            frame_rate: cfg.frame_rate,
            recorder,
            surface,
            sequencer: Sequencer::new(SeqSlot::Capture(id), self.opts.settle_delay),
            chunks: Vec::new(),
            frames_pushed: 0,
            started_at: self.now,
            stop_at: self.now + duration,
        };

        if duration == Millis::ZERO {
            // Stop immediately: no frames, no audio.
            let final_chunks = cap.recorder.finish()?;
            cap.collect(final_chunks);
            self.finalize_capture(cap);
            return Ok(id);
        }

        if let Some(playlist) = playlist {
            let CaptureSession {
                sequencer, recorder, ..
            } = &mut cap;
            let mut ctx = SeqCtx {
                now: self.now,
                timers: &mut self.timers,
                audio: self.audio.as_mut(),
                tap: Some(recorder.as_mut()),
                diag: &mut self.diag,
            };
            sequencer.play(&mut ctx, playlist);
        }

        self.timers.schedule_at(self.now, Event::CaptureFrame { id });
        self.timers.schedule_at(cap.stop_at, Event::CaptureStop { id });
        self.captures.insert(id, cap);
        Ok(id)
    }

    /// Drain the timer queue, advancing the virtual clock to each deadline.
    pub fn run_until_idle(&mut self) -> StagecastResult<()> {
        while let Some((at, event)) = self.timers.pop_next() {
            self.now = self.now.max(at);
            self.dispatch(event)?;
        }
        Ok(())
    }

    /// Process events due at or before `deadline`, then park the clock there.
    pub fn run_until(&mut self, deadline: Millis) -> StagecastResult<()> {
        while let Some((at, event)) = self.timers.pop_due(deadline) {
            self.now = self.now.max(at);
            self.dispatch(event)?;
        }
        self.now = self.now.max(deadline);
        Ok(())
    }

    fn dispatch(&mut self, event: Event) -> StagecastResult<()> {
        match event {
            Event::ClipEnded {
                slot,
                generation,
                clip,
            } => {
                self.with_sequencer(slot, SeqEvent::ClipEnded { generation, clip });
                Ok(())
            }
            Event::SettleElapsed {
                slot,
                generation,
                clip,
            } => {
                self.with_sequencer(slot, SeqEvent::SettleElapsed { generation, clip });
                Ok(())
            }
            Event::CaptionExpired { id } => {
                if let Some(caption) = self.captions.expire(id) {
                    self.diag.note(DiagEvent::CaptionExpired {
                        text: caption.text,
                        at: self.now,
                    });
                }
                Ok(())
            }
            Event::IntroDue { playlist } => {
                self.play_ui(playlist);
                Ok(())
            }
            Event::CaptureFrame { id } => self.pump_capture_frame(id),
            Event::CaptureStop { id } => self.stop_capture(id),
        }
    }

    fn with_sequencer(&mut self, slot: SeqSlot, event: SeqEvent) {
        match slot {
            SeqSlot::Ui => {
                let mut ctx = SeqCtx {
                    now: self.now,
                    timers: &mut self.timers,
                    audio: self.audio.as_mut(),
                    tap: None,
                    diag: &mut self.diag,
                };
                self.ui_seq.handle(&mut ctx, event);
            }
            SeqSlot::Capture(id) => {
                // Stale events for a finished capture fall through silently.
                let Some(cap) = self.captures.get_mut(&id) else {
                    return;
                };
                let CaptureSession {
                    sequencer, recorder, ..
                } = cap;
                let mut ctx = SeqCtx {
                    now: self.now,
                    timers: &mut self.timers,
                    audio: self.audio.as_mut(),
                    tap: Some(recorder.as_mut()),
                    diag: &mut self.diag,
                };
                sequencer.handle(&mut ctx, event);
            }
        }
    }

    fn play_ui(&mut self, playlist: Playlist) {
        let mut ctx = SeqCtx {
            now: self.now,
            timers: &mut self.timers,
            audio: self.audio.as_mut(),
            tap: None,
            diag: &mut self.diag,
        };
        self.ui_seq.play(&mut ctx, playlist);
    }

    fn show_caption(&mut self, text: String, display: Millis) {
        let id = self.captions.show(text.clone(), display);
        self.timers
            .schedule_at(self.now + display, Event::CaptionExpired { id });
        self.diag.note(DiagEvent::CaptionShown {
            text,
            display,
            at: self.now,
        });
    }

    fn pump_capture_frame(&mut self, id: CaptureId) -> StagecastResult<()> {
        let Some(cap) = self.captures.get_mut(&id) else {
            return Ok(());
        };

        let index = FrameIndex(cap.frames_pushed);
        let pushed = cap
            .surface
            .frame_at(index)
            .and_then(|frame| cap.recorder.push_frame(index, &frame));
        if let Err(e) = pushed {
            self.captures.remove(&id);
            tracing::error!(?id, error = %e, "capture aborted");
            return Err(StagecastError::capture(format!(
                "capture {} aborted at frame {}: {e}",
                id.0, index.0
            )));
        }
        cap.frames_pushed += 1;
        let chunks = cap.recorder.poll_chunks();
        cap.collect(chunks);

        let next_due = cap.started_at + Millis(cap.frame_rate.frame_offset_ms(cap.frames_pushed));
        if next_due < cap.stop_at {
            self.timers.schedule_at(next_due, Event::CaptureFrame { id });
        }
        Ok(())
    }

    fn stop_capture(&mut self, id: CaptureId) -> StagecastResult<()> {
        let Some(mut cap) = self.captures.remove(&id) else {
            return Ok(());
        };
        if cap.sequencer.cancel() {
            self.diag.note(DiagEvent::SequenceCancelled {
                slot: SeqSlot::Capture(id),
                at: self.now,
            });
        }
        let final_chunks = cap.recorder.finish()?;
        cap.collect(final_chunks);
        self.finalize_capture(cap);
        Ok(())
    }

    fn finalize_capture(&mut self, cap: CaptureSession) {
        let id = cap.id;
        let frames = cap.frames_pushed;
        let artifact = cap.assemble();
        self.diag.note(DiagEvent::CaptureFinished {
            id,
            frames,
            bytes: artifact.data.len(),
            at: self.now,
        });
        self.artifacts.push(artifact);
    }
}

fn pick_default_animation(asset: &ModelAsset) -> Option<String> {
    if asset.animation(DEFAULT_ANIMATION).is_some() {
        return Some(DEFAULT_ANIMATION.to_owned());
    }
    asset.animations.first().map(|a| a.name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AnimationInfo;

    #[test]
    fn default_animation_prefers_idle() {
        let asset = ModelAsset {
            name: "m".to_owned(),
            width: 10.0,
            height: 10.0,
            animations: vec![
                AnimationInfo {
                    name: "Talk_01_A".to_owned(),
                    duration: Millis(100),
                },
                AnimationInfo {
                    name: "Idle_01".to_owned(),
                    duration: Millis(100),
                },
            ],
            skins: vec![],
        };
        assert_eq!(pick_default_animation(&asset).as_deref(), Some("Idle_01"));
    }

    #[test]
    fn default_animation_falls_back_to_first() {
        let asset = ModelAsset {
            name: "m".to_owned(),
            width: 10.0,
            height: 10.0,
            animations: vec![AnimationInfo {
                name: "Walk_01".to_owned(),
                duration: Millis(100),
            }],
            skins: vec![],
        };
        assert_eq!(pick_default_animation(&asset).as_deref(), Some("Walk_01"));

        let empty = ModelAsset {
            name: "m".to_owned(),
            width: 10.0,
            height: 10.0,
            animations: vec![],
            skins: vec![],
        };
        assert_eq!(pick_default_animation(&empty), None);
    }
}

//! The playlist sequencer.
//!
//! Plays an ordered list of clips one after another: each clip runs to its
//! natural end, a fixed settle delay separates consecutive clips, and a clip
//! that fails to start counts as instantly complete (zero duration, zero
//! settle delay) so one bad clip never stalls the sequence.
//!
//! The sequencer is an explicit state machine advanced by `ClipEnded` and
//! `SettleElapsed` timer events. Cancellation is a generation counter:
//! starting a new playlist bumps the generation, and every event carries the
//! generation it was scheduled under, so stale events are dropped at each
//! suspension point. At most one sequence per slot is active at a time.

use crate::audio::AudioPlayer;
use crate::capture::{CaptureId, Recorder};
use crate::diag::{DiagEvent, DiagLog};
use crate::foundation::core::Millis;
use crate::playlist::Playlist;
use crate::runtime::{Event, TimerQueue};

/// Default pause between consecutive clips, avoiding clipping/overlap
/// artifacts between voice lines.
pub const SETTLE_DELAY: Millis = Millis(1000);

/// Which sequencer an event targets: the on-screen one, or the capture-aware
/// one owned by an export in flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeqSlot {
    Ui,
    Capture(CaptureId),
}

/// Observable sequencer state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SeqState {
    #[default]
    Idle,
    /// A clip is playing; waiting for its natural end.
    Playing { clip: usize },
    /// Between clips; waiting for the settle delay.
    Waiting { clip: usize },
}

/// Timer events the sequencer reacts to, already stripped to its own fields.
#[derive(Clone, Copy, Debug)]
pub(crate) enum SeqEvent {
    ClipEnded { generation: u64, clip: usize },
    SettleElapsed { generation: u64, clip: usize },
}

/// Borrowed session context a sequencer transition runs against.
pub(crate) struct SeqCtx<'a> {
    pub(crate) now: Millis,
    pub(crate) timers: &'a mut TimerQueue<Event>,
    pub(crate) audio: &'a mut dyn AudioPlayer,
    /// Capture tap: when present, every successfully started clip is also
    /// routed into the recorder's audio track.
    pub(crate) tap: Option<&'a mut dyn Recorder>,
    pub(crate) diag: &'a mut DiagLog,
}

#[derive(Debug)]
pub(crate) struct Sequencer {
    slot: SeqSlot,
    state: SeqState,
    playlist: Playlist,
    generation: u64,
    settle: Millis,
}

impl Sequencer {
    pub(crate) fn new(slot: SeqSlot, settle: Millis) -> Self {
        Self {
            slot,
            state: SeqState::Idle,
            playlist: Playlist::default(),
            generation: 0,
            settle,
        }
    }

    pub(crate) fn state(&self) -> SeqState {
        self.state
    }

    pub(crate) fn is_active(&self) -> bool {
        self.state != SeqState::Idle
    }

    /// Start playing `playlist` from the front. An empty playlist does
    /// nothing at all, not even cancel; otherwise any in-flight sequence is
    /// cancelled first.
    pub(crate) fn play(&mut self, ctx: &mut SeqCtx<'_>, playlist: Playlist) {
        if playlist.is_empty() {
            return;
        }
        if self.is_active() {
            ctx.diag.note(DiagEvent::SequenceCancelled {
                slot: self.slot,
                at: ctx.now,
            });
        }
        self.generation += 1;
        self.playlist = playlist;
        self.start_clip_from(ctx, 0);
    }

    /// Cancel whatever is in flight. Stale timer events are dropped by the
    /// generation check. Returns whether a sequence was actually cancelled.
    pub(crate) fn cancel(&mut self) -> bool {
        self.generation += 1;
        let was_active = self.is_active();
        self.state = SeqState::Idle;
        was_active
    }

    pub(crate) fn handle(&mut self, ctx: &mut SeqCtx<'_>, event: SeqEvent) {
        match event {
            SeqEvent::ClipEnded { generation, clip } => self.on_clip_ended(ctx, generation, clip),
            SeqEvent::SettleElapsed { generation, clip } => {
                self.on_settle_elapsed(ctx, generation, clip)
            }
        }
    }

    fn on_clip_ended(&mut self, ctx: &mut SeqCtx<'_>, generation: u64, clip: usize) {
        if generation != self.generation {
            return; // cancelled sequence
        }
        let SeqState::Playing { clip: current } = self.state else {
            return;
        };
        if current != clip {
            return;
        }

        ctx.diag.note(DiagEvent::ClipFinished {
            slot: self.slot,
            index: clip,
            at: ctx.now,
        });

        if clip + 1 >= self.playlist.len() {
            self.state = SeqState::Idle;
            ctx.diag.note(DiagEvent::SequenceFinished {
                slot: self.slot,
                at: ctx.now,
            });
            return;
        }

        self.state = SeqState::Waiting { clip };
        ctx.timers.schedule_at(
            ctx.now + self.settle,
            Event::SettleElapsed {
                slot: self.slot,
                generation: self.generation,
                clip,
            },
        );
    }

    fn on_settle_elapsed(&mut self, ctx: &mut SeqCtx<'_>, generation: u64, clip: usize) {
        if generation != self.generation {
            return; // cancelled sequence
        }
        let SeqState::Waiting { clip: current } = self.state else {
            return;
        };
        if current != clip {
            return;
        }
        self.start_clip_from(ctx, clip + 1);
    }

    /// Try clips starting at `index`; start failures advance immediately with
    /// no settle delay.
    fn start_clip_from(&mut self, ctx: &mut SeqCtx<'_>, index: usize) {
        let mut index = index;
        loop {
            let Some(clip) = self.playlist.get(index) else {
                self.state = SeqState::Idle;
                ctx.diag.note(DiagEvent::SequenceFinished {
                    slot: self.slot,
                    at: ctx.now,
                });
                return;
            };

            match ctx.audio.start(clip) {
                Ok(started) => {
                    if let Some(tap) = ctx.tap.as_mut() {
                        if let Err(e) = tap.route_clip(clip, ctx.now) {
                            ctx.diag.note(DiagEvent::ClipRouteFailed {
                                slot: self.slot,
                                index,
                                url: clip.url.clone(),
                                reason: e.to_string(),
                                at: ctx.now,
                            });
                        }
                    }
                    ctx.diag.note(DiagEvent::ClipStarted {
                        slot: self.slot,
                        index,
                        url: clip.url.clone(),
                        at: ctx.now,
                    });
                    self.state = SeqState::Playing { clip: index };
                    ctx.timers.schedule_at(
                        ctx.now + started.duration,
                        Event::ClipEnded {
                            slot: self.slot,
                            generation: self.generation,
                            clip: index,
                        },
                    );
                    return;
                }
                Err(e) => {
                    ctx.diag.note(DiagEvent::ClipStartFailed {
                        slot: self.slot,
                        index,
                        url: clip.url.clone(),
                        reason: e.to_string(),
                        at: ctx.now,
                    });
                    index += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ClipStarted;
    use crate::foundation::error::{StagecastError, StagecastResult};
    use crate::playlist::Clip;

    struct Scripted {
        fail_urls: Vec<String>,
        duration: Millis,
    }

    impl AudioPlayer for Scripted {
        fn start(&mut self, clip: &Clip) -> StagecastResult<ClipStarted> {
            if self.fail_urls.iter().any(|u| u == &clip.url) {
                return Err(StagecastError::playback("blocked"));
            }
            Ok(ClipStarted {
                duration: self.duration,
            })
        }
    }

    struct Harness {
        seq: Sequencer,
        timers: TimerQueue<Event>,
        audio: Scripted,
        diag: DiagLog,
        now: Millis,
    }

    impl Harness {
        fn new(fail_urls: Vec<String>, duration: Millis) -> Self {
            Self {
                seq: Sequencer::new(SeqSlot::Ui, SETTLE_DELAY),
                timers: TimerQueue::new(),
                audio: Scripted {
                    fail_urls,
                    duration,
                },
                diag: DiagLog::new(),
                now: Millis::ZERO,
            }
        }

        fn play(&mut self, urls: &[&str]) {
            let playlist = Playlist::new(
                urls.iter()
                    .map(|u| Clip {
                        url: (*u).to_owned(),
                    })
                    .collect(),
            );
            let mut ctx = SeqCtx {
                now: self.now,
                timers: &mut self.timers,
                audio: &mut self.audio,
                tap: None,
                diag: &mut self.diag,
            };
            self.seq.play(&mut ctx, playlist);
        }

        fn run_until_idle(&mut self) {
            while let Some((at, ev)) = self.timers.pop_next() {
                self.now = self.now.max(at);
                let seq_ev = match ev {
                    Event::ClipEnded {
                        generation, clip, ..
                    } => SeqEvent::ClipEnded { generation, clip },
                    Event::SettleElapsed {
                        generation, clip, ..
                    } => SeqEvent::SettleElapsed { generation, clip },
                    other => panic!("unexpected event {other:?}"),
                };
                let mut ctx = SeqCtx {
                    now: self.now,
                    timers: &mut self.timers,
                    audio: &mut self.audio,
                    tap: None,
                    diag: &mut self.diag,
                };
                self.seq.handle(&mut ctx, seq_ev);
            }
        }
    }

    fn started_at(diag: &DiagLog) -> Vec<(String, u64)> {
        diag.events()
            .iter()
            .filter_map(|e| match e {
                DiagEvent::ClipStarted { url, at, .. } => Some((url.clone(), at.0)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn clips_play_in_order_with_settle_gaps() {
        let mut h = Harness::new(vec![], Millis(2000));
        h.play(&["a.ogg", "b.ogg", "c.ogg"]);
        h.run_until_idle();

        assert_eq!(
            started_at(&h.diag),
            vec![
                ("a.ogg".to_owned(), 0),
                ("b.ogg".to_owned(), 3000),
                ("c.ogg".to_owned(), 6000),
            ]
        );
        // Total elapsed: 3 * 2000 + 2 * 1000, no settle after the final clip.
        assert_eq!(h.now, Millis(8000));
        assert_eq!(h.seq.state(), SeqState::Idle);
    }

    #[test]
    fn failed_clip_contributes_no_duration_and_no_settle() {
        let mut h = Harness::new(vec!["b.ogg".to_owned()], Millis(1000));
        h.play(&["a.ogg", "b.ogg", "c.ogg"]);
        h.run_until_idle();

        assert_eq!(
            started_at(&h.diag),
            vec![("a.ogg".to_owned(), 0), ("c.ogg".to_owned(), 2000)]
        );
        let failed: Vec<_> = h
            .diag
            .events()
            .iter()
            .filter_map(|e| match e {
                DiagEvent::ClipStartFailed { index, at, .. } => Some((*index, at.0)),
                _ => None,
            })
            .collect();
        assert_eq!(failed, vec![(1, 2000)]);
    }

    #[test]
    fn leading_failures_never_stall_the_sequence() {
        let mut h = Harness::new(vec!["a.ogg".to_owned(), "b.ogg".to_owned()], Millis(500));
        h.play(&["a.ogg", "b.ogg", "c.ogg"]);
        h.run_until_idle();

        assert_eq!(started_at(&h.diag), vec![("c.ogg".to_owned(), 0)]);
        assert_eq!(h.now, Millis(500));
    }

    #[test]
    fn empty_playlist_is_a_complete_no_op() {
        let mut h = Harness::new(vec![], Millis(1000));
        h.play(&[]);
        assert!(h.timers.is_empty());
        assert_eq!(h.seq.state(), SeqState::Idle);
        assert!(h.diag.events().is_empty());
    }

    #[test]
    fn empty_playlist_does_not_cancel_a_running_sequence() {
        let mut h = Harness::new(vec![], Millis(2000));
        h.play(&["a.ogg"]);
        h.play(&[]);
        h.run_until_idle();

        assert!(
            h.diag
                .events()
                .iter()
                .any(|e| matches!(e, DiagEvent::ClipFinished { .. }))
        );
        assert!(
            !h.diag
                .events()
                .iter()
                .any(|e| matches!(e, DiagEvent::SequenceCancelled { .. }))
        );
    }

    #[test]
    fn all_failures_terminate_immediately() {
        let mut h = Harness::new(
            vec!["a.ogg".to_owned(), "b.ogg".to_owned()],
            Millis(1000),
        );
        h.play(&["a.ogg", "b.ogg"]);
        assert!(h.timers.is_empty());
        assert_eq!(h.seq.state(), SeqState::Idle);
        assert!(
            h.diag
                .events()
                .iter()
                .any(|e| matches!(e, DiagEvent::SequenceFinished { .. }))
        );
    }

    #[test]
    fn restart_cancels_in_flight_sequence() {
        let mut h = Harness::new(vec![], Millis(2000));
        h.play(&["a.ogg", "b.ogg"]);
        // Interrupt mid-clip: the pending ClipEnded event becomes stale.
        h.play(&["x.ogg"]);
        h.run_until_idle();

        assert_eq!(
            started_at(&h.diag),
            vec![("a.ogg".to_owned(), 0), ("x.ogg".to_owned(), 0)]
        );
        assert!(
            h.diag
                .events()
                .iter()
                .any(|e| matches!(e, DiagEvent::SequenceCancelled { .. }))
        );
        // Only x.ogg runs to completion; b.ogg never starts.
        assert_eq!(h.now, Millis(2000));
    }
}

//! Structured diagnostics.
//!
//! Playback failures are swallowed by design (one bad clip must never stall a
//! sequence), so every swallow, start, finish and cancellation lands here and
//! mirrors into `tracing`. Tests assert against this log without changing
//! playback semantics.

use crate::capture::CaptureId;
use crate::foundation::core::Millis;
use crate::sequencer::SeqSlot;

/// One recorded playback/capture event, stamped with the virtual-clock time
/// it happened at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiagEvent {
    ModelLoaded {
        model: String,
        at: Millis,
    },
    IntroScheduled {
        model: String,
        /// When the intro will fire.
        due: Millis,
    },
    ClipStarted {
        slot: SeqSlot,
        index: usize,
        url: String,
        at: Millis,
    },
    ClipStartFailed {
        slot: SeqSlot,
        index: usize,
        url: String,
        reason: String,
        at: Millis,
    },
    ClipRouteFailed {
        slot: SeqSlot,
        index: usize,
        url: String,
        reason: String,
        at: Millis,
    },
    ClipFinished {
        slot: SeqSlot,
        index: usize,
        at: Millis,
    },
    SequenceFinished {
        slot: SeqSlot,
        at: Millis,
    },
    SequenceCancelled {
        slot: SeqSlot,
        at: Millis,
    },
    CaptionShown {
        text: String,
        display: Millis,
        at: Millis,
    },
    CaptionExpired {
        text: String,
        at: Millis,
    },
    CaptureStarted {
        id: CaptureId,
        duration: Millis,
        at: Millis,
    },
    CaptureFinished {
        id: CaptureId,
        frames: u64,
        bytes: usize,
        at: Millis,
    },
}

/// Append-only diagnostics sink.
#[derive(Debug, Default)]
pub struct DiagLog {
    events: Vec<DiagEvent>,
}

impl DiagLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn note(&mut self, event: DiagEvent) {
        match &event {
            DiagEvent::ClipStartFailed {
                slot,
                index,
                url,
                reason,
                at,
            } => {
                tracing::warn!(?slot, index, %url, %reason, at = at.0, "clip failed to start; skipping")
            }
            DiagEvent::ClipRouteFailed {
                slot,
                index,
                url,
                reason,
                at,
            } => {
                tracing::warn!(?slot, index, %url, %reason, at = at.0, "clip audio not routed into capture")
            }
            DiagEvent::CaptureStarted { id, duration, at } => {
                tracing::info!(?id, duration = duration.0, at = at.0, "capture started")
            }
            DiagEvent::CaptureFinished {
                id,
                frames,
                bytes,
                at,
            } => {
                tracing::info!(?id, frames, bytes, at = at.0, "capture finished")
            }
            other => tracing::debug!(event = ?other, "playback event"),
        }
        self.events.push(event);
    }

    pub fn events(&self) -> &[DiagEvent] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_preserves_event_order() {
        let mut log = DiagLog::new();
        log.note(DiagEvent::SequenceFinished {
            slot: SeqSlot::Ui,
            at: Millis(5),
        });
        log.note(DiagEvent::SequenceCancelled {
            slot: SeqSlot::Ui,
            at: Millis(9),
        });
        assert_eq!(log.events().len(), 2);
        assert!(matches!(log.events()[0], DiagEvent::SequenceFinished { .. }));
        assert!(matches!(log.events()[1], DiagEvent::SequenceCancelled { .. }));

        log.clear();
        assert!(log.events().is_empty());
    }
}

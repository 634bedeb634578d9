//! Explicit timer queue driving the session's virtual clock.
//!
//! The original viewer suspends by registering continuation callbacks on
//! media-element completion events and `setTimeout` timers. Here every
//! suspension point is an entry in a deadline-ordered queue; the session loop
//! advances the clock to each deadline and dispatches the payload. Entries
//! with equal deadlines fire in scheduling order, so dispatch is fully
//! deterministic.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use crate::captions::CaptionId;
use crate::capture::CaptureId;
use crate::foundation::core::Millis;
use crate::playlist::Playlist;
use crate::sequencer::SeqSlot;

/// Everything the session can be woken up for.
#[derive(Clone, Debug)]
pub(crate) enum Event {
    /// A started clip reached its natural end.
    ClipEnded {
        slot: SeqSlot,
        generation: u64,
        clip: usize,
    },
    /// The inter-clip settle delay elapsed.
    SettleElapsed {
        slot: SeqSlot,
        generation: u64,
        clip: usize,
    },
    /// A caption's display duration elapsed.
    CaptionExpired { id: CaptionId },
    /// The model-specific intro delay elapsed; play the bound playlist.
    IntroDue { playlist: Playlist },
    /// A capture session's next frame is due.
    CaptureFrame { id: CaptureId },
    /// A capture session's recording window closed.
    CaptureStop { id: CaptureId },
}

/// Deadline-ordered timer queue with deterministic FIFO tie-breaking.
#[derive(Debug)]
pub(crate) struct TimerQueue<T> {
    heap: BinaryHeap<Reverse<(u64, u64)>>,
    payloads: HashMap<u64, T>,
    next_seq: u64,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self {
            heap: BinaryHeap::new(),
            payloads: HashMap::new(),
            next_seq: 0,
        }
    }
}

impl<T> TimerQueue<T> {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn schedule_at(&mut self, at: Millis, payload: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse((at.0, seq)));
        self.payloads.insert(seq, payload);
    }

    pub(crate) fn next_deadline(&self) -> Option<Millis> {
        self.heap.peek().map(|Reverse((at, _))| Millis(*at))
    }

    /// Pop the earliest entry regardless of deadline.
    pub(crate) fn pop_next(&mut self) -> Option<(Millis, T)> {
        let Reverse((at, seq)) = self.heap.pop()?;
        let payload = self
            .payloads
            .remove(&seq)
            .expect("timer payload must exist for heap entry");
        Some((Millis(at), payload))
    }

    /// Pop the earliest entry with a deadline at or before `deadline`.
    pub(crate) fn pop_due(&mut self, deadline: Millis) -> Option<(Millis, T)> {
        match self.next_deadline() {
            Some(at) if at <= deadline => self.pop_next(),
            _ => None,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

use crate::foundation::error::{StagecastError, StagecastResult};

/// A point on (or span of) the session's virtual clock, in milliseconds.
///
/// All suspension points in the viewer (clip completion, settle delays, intro
/// delays, capture windows) are expressed as `Millis` deadlines on the timer
/// queue. Addition saturates.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct Millis(pub u64);

impl Millis {
    pub const ZERO: Millis = Millis(0);

    /// Convert (possibly fractional) seconds into `Millis`, rounding to the
    /// nearest millisecond. Non-finite and negative inputs clamp to zero.
    pub fn from_secs_f64(secs: f64) -> Millis {
        if !secs.is_finite() || secs <= 0.0 {
            return Millis::ZERO;
        }
        Millis((secs * 1000.0).round() as u64)
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1000.0
    }

    pub fn saturating_sub(self, other: Millis) -> Millis {
        Millis(self.0.saturating_sub(other.0))
    }
}

impl std::ops::Add for Millis {
    type Output = Millis;

    fn add(self, rhs: Millis) -> Millis {
        Millis(self.0.saturating_add(rhs.0))
    }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    pub num: u32,
    pub den: u32, // must be > 0
}

impl Fps {
    pub fn new(num: u32, den: u32) -> StagecastResult<Self> {
        if num == 0 {
            return Err(StagecastError::validation("Fps num must be > 0"));
        }
        if den == 0 {
            return Err(StagecastError::validation("Fps den must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Millisecond offset of frame `index` from the start of a capture,
    /// floored to the virtual-clock granularity.
    pub fn frame_offset_ms(self, index: u64) -> u64 {
        (index * 1000 * u64::from(self.den)) / u64::from(self.num)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

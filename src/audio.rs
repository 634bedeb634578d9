//! The audio playback boundary.
//!
//! Decoding and output are the host's concern. The sequencer only needs one
//! contract: attempt to start a clip, and learn either its natural duration
//! or that the start failed (platform policy, missing resource). Failure is
//! the caller's signal to advance immediately.

use std::path::{Path, PathBuf};

use crate::foundation::core::Millis;
use crate::foundation::error::{StagecastError, StagecastResult};
use crate::playlist::Clip;

/// Returned by a successful clip start.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClipStarted {
    /// Natural playback duration of the clip.
    pub duration: Millis,
}

/// Starts clips and reports their natural durations.
pub trait AudioPlayer {
    /// Attempt to start `clip` immediately. `Err` means the clip never began
    /// (blocked autoplay, missing resource); the sequencer treats it as
    /// instantly complete.
    fn start(&mut self, clip: &Clip) -> StagecastResult<ClipStarted>;
}

/// Always-succeeding player that "plays" silence for a fixed duration.
#[derive(Clone, Copy, Debug)]
pub struct SilentAudioPlayer {
    pub clip_duration: Millis,
}

impl AudioPlayer for SilentAudioPlayer {
    fn start(&mut self, _clip: &Clip) -> StagecastResult<ClipStarted> {
        Ok(ClipStarted {
            duration: self.clip_duration,
        })
    }
}

/// Reference player: resolves clips against a content root and derives their
/// durations through `ffprobe`. No audio device is opened; the virtual clock
/// stands in for real output.
#[derive(Clone, Debug)]
pub struct FfprobeAudioPlayer {
    root: PathBuf,
}

impl FfprobeAudioPlayer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AudioPlayer for FfprobeAudioPlayer {
    fn start(&mut self, clip: &Clip) -> StagecastResult<ClipStarted> {
        let path = self.root.join(&clip.url);
        if !path.is_file() {
            return Err(StagecastError::playback(format!(
                "audio clip '{}' not found",
                path.display()
            )));
        }
        let duration = probe_media_duration(&path)?;
        Ok(ClipStarted { duration })
    }
}

/// Probe a media file's container duration through `ffprobe`.
pub fn probe_media_duration(path: &Path) -> StagecastResult<Millis> {
    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        format: Option<ProbeFormat>,
    }

    let out = std::process::Command::new("ffprobe")
        .args(["-v", "error", "-print_format", "json", "-show_format"])
        .arg(path)
        .output()
        .map_err(|e| StagecastError::playback(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(StagecastError::playback(format!(
            "ffprobe failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
        .map_err(|e| StagecastError::playback(format!("ffprobe json parse failed: {e}")))?;
    let secs = parsed
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.parse::<f64>().ok())
        .ok_or_else(|| {
            StagecastError::playback(format!(
                "ffprobe reported no duration for '{}'",
                path.display()
            ))
        })?;
    Ok(Millis::from_secs_f64(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_player_reports_fixed_duration() {
        let mut p = SilentAudioPlayer {
            clip_duration: Millis(750),
        };
        let started = p
            .start(&Clip {
                url: "whatever.ogg".to_owned(),
            })
            .unwrap();
        assert_eq!(started.duration, Millis(750));
    }

    #[test]
    fn missing_clip_is_a_start_failure() {
        let mut p = FfprobeAudioPlayer::new("/nonexistent/stagecast-audio");
        let err = p
            .start(&Clip {
                url: "hero_talk_1_1.ogg".to_owned(),
            })
            .unwrap_err();
        assert!(matches!(err, StagecastError::Playback(_)));
    }
}

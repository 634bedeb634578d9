//! Recorder backed by the system `ffmpeg` binary.
//!
//! Frames are flattened to opaque RGBA8 and streamed over stdin into a
//! temporary container file; routed audio clips are muxed in with a second
//! pass (`adelay` per clip, `amix` across clips) once the video leg is
//! finalized. The finished container is then emitted as bounded chunks in
//! order. We intentionally spawn the system binary rather than link FFmpeg
//! natively, avoiding dev header/lib requirements.

use std::io::Read as _;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::capture::recorder::{MediaChunk, Recorder, RecorderBackend, RecorderSpec};
use crate::foundation::core::{FrameIndex, Millis};
use crate::foundation::error::{StagecastError, StagecastResult};
use crate::playlist::Clip;
use crate::surface::FrameRGBA;

const CHUNK_BYTES: usize = 1 << 20;

static NEXT_TMP: AtomicU64 = AtomicU64::new(0);

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Opens [`FfmpegRecorder`]s. Audio clips routed during capture are resolved
/// against `assets_root`.
#[derive(Clone, Debug)]
pub struct FfmpegRecorderBackend {
    assets_root: PathBuf,
}

impl FfmpegRecorderBackend {
    pub fn new(assets_root: impl Into<PathBuf>) -> Self {
        Self {
            assets_root: assets_root.into(),
        }
    }
}

impl RecorderBackend for FfmpegRecorderBackend {
    fn open(&mut self, spec: &RecorderSpec) -> StagecastResult<Box<dyn Recorder>> {
        spec.validate()?;
        let container = Container::for_format(&spec.format)?;
        if spec.width % 2 != 0 || spec.height % 2 != 0 {
            return Err(StagecastError::validation(
                "capture width/height must be even (required for yuv420p output)",
            ));
        }
        if !is_ffmpeg_on_path() {
            return Err(StagecastError::capture(
                "ffmpeg is required for video capture, but was not found on PATH",
            ));
        }
        Ok(Box::new(FfmpegRecorder {
            spec: spec.clone(),
            container,
            assets_root: self.assets_root.clone(),
            video_tmp: TempFileGuard(None),
            mux_tmp: TempFileGuard(None),
            child: None,
            stdin: None,
            stderr_drain: None,
            scratch: Vec::new(),
            last_index: None,
            routed: Vec::new(),
            finished: false,
        }))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Container {
    Webm,
    Mp4,
}

impl Container {
    fn for_format(format: &str) -> StagecastResult<Container> {
        match format.trim().to_ascii_lowercase().as_str() {
            "video/webm" | "webm" => Ok(Container::Webm),
            "video/mp4" | "mp4" => Ok(Container::Mp4),
            other => Err(StagecastError::capture(format!(
                "unsupported capture format '{other}' (expected video/webm or video/mp4)"
            ))),
        }
    }

    fn ext(self) -> &'static str {
        match self {
            Container::Webm => "webm",
            Container::Mp4 => "mp4",
        }
    }

    fn video_args(self, bitrate_bps: u32) -> Vec<String> {
        let b = bitrate_bps.to_string();
        match self {
            Container::Webm => vec![
                "-c:v".into(),
                "libvpx-vp9".into(),
                "-b:v".into(),
                b,
                "-pix_fmt".into(),
                "yuv420p".into(),
                "-deadline".into(),
                "realtime".into(),
                "-cpu-used".into(),
                "8".into(),
            ],
            Container::Mp4 => vec![
                "-c:v".into(),
                "libx264".into(),
                "-b:v".into(),
                b,
                "-pix_fmt".into(),
                "yuv420p".into(),
                "-movflags".into(),
                "+faststart".into(),
            ],
        }
    }

    fn audio_codec(self) -> &'static str {
        match self {
            Container::Webm => "libopus",
            Container::Mp4 => "aac",
        }
    }
}

pub struct FfmpegRecorder {
    spec: RecorderSpec,
    container: Container,
    assets_root: PathBuf,

    video_tmp: TempFileGuard,
    mux_tmp: TempFileGuard,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,

    scratch: Vec<u8>,
    last_index: Option<FrameIndex>,
    /// Routed clips as (capture offset, resolved path), in routing order.
    routed: Vec<(Millis, PathBuf)>,
    finished: bool,
}

impl Recorder for FfmpegRecorder {
    fn begin(&mut self) -> StagecastResult<()> {
        if self.child.is_some() || self.finished {
            return Err(StagecastError::capture("recorder already started"));
        }

        let path = temp_path(self.container.ext());
        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd.args([
            "-y",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", self.spec.width, self.spec.height),
            "-r",
            &format!("{}/{}", self.spec.fps.num, self.spec.fps.den),
            "-i",
            "pipe:0",
            "-an",
        ]);
        cmd.args(self.container.video_args(self.spec.bitrate_bps));
        cmd.arg(&path);

        let mut child = cmd.spawn().map_err(|e| {
            StagecastError::capture(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| StagecastError::capture("failed to open ffmpeg stdin (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| StagecastError::capture("failed to open ffmpeg stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut bytes = Vec::new();
            stderr.read_to_end(&mut bytes)?;
            Ok(bytes)
        });

        self.scratch = vec![0u8; (self.spec.width * self.spec.height * 4) as usize];
        self.video_tmp = TempFileGuard(Some(path));
        self.child = Some(child);
        self.stdin = Some(stdin);
        self.stderr_drain = Some(stderr_drain);
        self.last_index = None;
        Ok(())
    }

    fn push_frame(&mut self, index: FrameIndex, frame: &FrameRGBA) -> StagecastResult<()> {
        if self.finished {
            return Err(StagecastError::capture("recorder already finished"));
        }
        if let Some(last) = self.last_index
            && index.0 <= last.0
        {
            return Err(StagecastError::capture(
                "recorder received out-of-order frame index",
            ));
        }
        self.last_index = Some(index);

        if frame.width != self.spec.width || frame.height != self.spec.height {
            return Err(StagecastError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, self.spec.width, self.spec.height
            )));
        }
        if frame.data.len() != self.scratch.len() {
            return Err(StagecastError::validation(
                "frame.data size mismatch with width*height*4",
            ));
        }

        flatten_to_opaque_rgba8(&mut self.scratch, &frame.data, frame.premultiplied)?;

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(StagecastError::capture("recorder not started"));
        };
        use std::io::Write as _;
        stdin.write_all(&self.scratch).map_err(|e| {
            StagecastError::capture(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;
        Ok(())
    }

    fn route_clip(&mut self, clip: &Clip, at: Millis) -> StagecastResult<()> {
        if self.finished {
            return Err(StagecastError::capture("recorder already finished"));
        }
        let path = self.assets_root.join(&clip.url);
        if !path.is_file() {
            return Err(StagecastError::playback(format!(
                "audio clip '{}' not found for capture routing",
                path.display()
            )));
        }
        self.routed.push((at, path));
        Ok(())
    }

    fn poll_chunks(&mut self) -> Vec<MediaChunk> {
        // Container bytes only materialize at finish.
        Vec::new()
    }

    fn finish(&mut self) -> StagecastResult<Vec<MediaChunk>> {
        if self.finished {
            return Err(StagecastError::capture("recorder already finished"));
        }
        self.finished = true;

        drop(self.stdin.take());
        let child = self
            .child
            .take()
            .ok_or_else(|| StagecastError::capture("recorder was never started"))?;
        wait_child("ffmpeg", child, self.stderr_drain.take())?;

        let video_path = self
            .video_tmp
            .0
            .clone()
            .ok_or_else(|| StagecastError::capture("capture temp file missing (unexpected)"))?;

        let out_path = if self.routed.is_empty() {
            video_path
        } else {
            let mux_path = temp_path(self.container.ext());
            self.mux_tmp = TempFileGuard(Some(mux_path.clone()));
            mux_audio(&video_path, &self.routed, self.container, &mux_path)?;
            mux_path
        };

        let bytes = std::fs::read(&out_path).map_err(|e| {
            StagecastError::capture(format!(
                "failed to read captured container '{}': {e}",
                out_path.display()
            ))
        })?;
        Ok(chunk_bytes(bytes))
    }
}

impl Drop for FfmpegRecorder {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

fn temp_path(ext: &str) -> PathBuf {
    let n = NEXT_TMP.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("stagecast_capture_{}_{}.{}", std::process::id(), n, ext))
}

fn wait_child(
    what: &str,
    mut child: Child,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,
) -> StagecastResult<()> {
    let status = child
        .wait()
        .map_err(|e| StagecastError::capture(format!("failed to wait for {what}: {e}")))?;
    let stderr_bytes = match stderr_drain {
        Some(handle) => handle
            .join()
            .map_err(|_| StagecastError::capture(format!("{what} stderr drain thread panicked")))?
            .map_err(|e| StagecastError::capture(format!("{what} stderr read failed: {e}")))?,
        None => Vec::new(),
    };
    if !status.success() {
        let stderr = String::from_utf8_lossy(&stderr_bytes);
        return Err(StagecastError::capture(format!(
            "{what} exited with status {}: {}",
            status,
            stderr.trim()
        )));
    }
    Ok(())
}

/// Second pass: delay each routed clip to its capture offset, mix, and mux
/// with the already-encoded video stream (copied, not re-encoded).
fn mux_audio(
    video: &Path,
    routed: &[(Millis, PathBuf)],
    container: Container,
    out: &Path,
) -> StagecastResult<()> {
    let mut cmd = Command::new("ffmpeg");
    cmd.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::piped());
    cmd.args(["-y", "-loglevel", "error", "-i"]).arg(video);
    for (_, path) in routed {
        cmd.arg("-i").arg(path);
    }

    let filter = build_audio_filter(routed);
    cmd.args(["-filter_complex", &filter, "-map", "0:v", "-map", "[aout]"]);
    cmd.args(["-c:v", "copy", "-c:a", container.audio_codec(), "-shortest"]);
    cmd.arg(out);

    let mut child = cmd
        .spawn()
        .map_err(|e| StagecastError::capture(format!("failed to spawn ffmpeg mux pass: {e}")))?;
    let stderr_drain = child.stderr.take().map(|mut stderr| {
        std::thread::spawn(move || {
            let mut bytes = Vec::new();
            stderr.read_to_end(&mut bytes)?;
            Ok(bytes)
        })
    });
    wait_child("ffmpeg mux pass", child, stderr_drain)
}

/// Filtergraph delaying each clip to its capture offset and mixing the
/// results into `[aout]`. Audio inputs start at ffmpeg input index 1 (the
/// video leg is input 0).
fn build_audio_filter(routed: &[(Millis, PathBuf)]) -> String {
    let mut filter = String::new();
    for (i, (at, _)) in routed.iter().enumerate() {
        let label = if routed.len() == 1 {
            "aout".to_owned()
        } else {
            format!("a{i}")
        };
        filter.push_str(&format!("[{}:a]adelay={}:all=1[{}];", i + 1, at.0, label));
    }
    if routed.len() > 1 {
        for i in 0..routed.len() {
            filter.push_str(&format!("[a{i}]"));
        }
        filter.push_str(&format!(
            "amix=inputs={}:duration=longest:normalize=0[aout];",
            routed.len()
        ));
    }
    filter.pop(); // trailing ';'
    filter
}

/// Flatten RGBA8 (premultiplied or straight) over opaque black.
fn flatten_to_opaque_rgba8(dst: &mut [u8], src: &[u8], src_is_premul: bool) -> StagecastResult<()> {
    if dst.len() != src.len() || dst.len() % 4 != 0 {
        return Err(StagecastError::validation(
            "flatten_to_opaque_rgba8 expects equal-length rgba8 buffers",
        ));
    }

    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let a = s[3] as u16;
        if a == 255 {
            d.copy_from_slice(s);
            continue;
        }
        if src_is_premul {
            d[0] = s[0];
            d[1] = s[1];
            d[2] = s[2];
        } else {
            d[0] = mul_div255(s[0] as u16, a);
            d[1] = mul_div255(s[1] as u16, a);
            d[2] = mul_div255(s[2] as u16, a);
        }
        d[3] = 255;
    }
    Ok(())
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

fn chunk_bytes(data: Vec<u8>) -> Vec<MediaChunk> {
    if data.is_empty() {
        return Vec::new();
    }
    data.chunks(CHUNK_BYTES)
        .map(|c| MediaChunk { data: c.to_vec() })
        .collect()
}

struct TempFileGuard(Option<PathBuf>);

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if let Some(path) = self.0.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_strings_map_to_containers() {
        assert_eq!(Container::for_format("video/webm").unwrap(), Container::Webm);
        assert_eq!(Container::for_format("WEBM").unwrap(), Container::Webm);
        assert_eq!(Container::for_format("video/mp4").unwrap(), Container::Mp4);
        assert!(Container::for_format("video/x-msvideo").is_err());
    }

    #[test]
    fn single_clip_filter_delays_straight_to_aout() {
        let routed = vec![(Millis(1400), PathBuf::from("a.ogg"))];
        assert_eq!(build_audio_filter(&routed), "[1:a]adelay=1400:all=1[aout]");
    }

    #[test]
    fn multi_clip_filter_delays_then_mixes() {
        let routed = vec![
            (Millis(0), PathBuf::from("a.ogg")),
            (Millis(2500), PathBuf::from("b.ogg")),
        ];
        assert_eq!(
            build_audio_filter(&routed),
            "[1:a]adelay=0:all=1[a0];[2:a]adelay=2500:all=1[a1];\
             [a0][a1]amix=inputs=2:duration=longest:normalize=0[aout]"
        );
    }

    #[test]
    fn flatten_premul_passes_color_through() {
        let src = vec![128u8, 0, 0, 128];
        let mut dst = vec![0u8; 4];
        flatten_to_opaque_rgba8(&mut dst, &src, true).unwrap();
        assert_eq!(dst, vec![128, 0, 0, 255]);
    }

    #[test]
    fn flatten_straight_multiplies_by_alpha() {
        let src = vec![255u8, 0, 0, 128];
        let mut dst = vec![0u8; 4];
        flatten_to_opaque_rgba8(&mut dst, &src, false).unwrap();
        assert_eq!(dst, vec![128, 0, 0, 255]);
    }

    #[test]
    fn chunking_preserves_every_byte_in_order() {
        let data: Vec<u8> = (0..u8::MAX).cycle().take(CHUNK_BYTES * 2 + 17).collect();
        let chunks = chunk_bytes(data.clone());
        assert_eq!(chunks.len(), 3);
        let reassembled: Vec<u8> = chunks.into_iter().flat_map(|c| c.data).collect();
        assert_eq!(reassembled, data);
    }
}

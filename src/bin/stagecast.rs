use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use stagecast::{
    Backends, Canvas, ContentPack, ExportConfig, FfmpegRecorderBackend, FfprobeAudioPlayer, Fps,
    FrameIndex, JsonModelLoader, SolidSurfaceBackend, ViewerSession, ViewerSessionOpts,
};

#[derive(Parser, Debug)]
#[command(name = "stagecast", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List catalog models (display names applied).
    Models(ModelsArgs),
    /// Show a model's animations and skins.
    Info(InfoArgs),
    /// Render one preview frame as a PNG.
    Frame(FrameArgs),
    /// Export the selected animation to a video file (requires `ffmpeg` on PATH).
    Export(ExportArgs),
}

#[derive(Parser, Debug)]
struct ModelsArgs {
    /// Content directory (models.json, renames.json, dialogs.json, audio_map.json).
    #[arg(long)]
    content: PathBuf,
}

#[derive(Parser, Debug)]
struct InfoArgs {
    /// Content directory.
    #[arg(long)]
    content: PathBuf,

    /// Internal model name from the catalog.
    #[arg(long)]
    model: String,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Content directory.
    #[arg(long)]
    content: PathBuf,

    /// Internal model name from the catalog.
    #[arg(long)]
    model: String,

    /// Animation to preview; defaults to the model's default selection.
    #[arg(long)]
    animation: Option<String>,

    /// Surface width in pixels.
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Surface height in pixels.
    #[arg(long, default_value_t = 720)]
    height: u32,

    /// Frame index (0-based).
    #[arg(long, default_value_t = 0)]
    frame: u64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct ExportArgs {
    /// Content directory.
    #[arg(long)]
    content: PathBuf,

    /// Internal model name from the catalog.
    #[arg(long)]
    model: String,

    /// Animation to export; defaults to the model's default selection.
    #[arg(long)]
    animation: Option<String>,

    /// Export width in pixels.
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Export height in pixels.
    #[arg(long, default_value_t = 720)]
    height: u32,

    /// Video bitrate in Mbps.
    #[arg(long, default_value_t = 5.0)]
    bitrate_mbps: f64,

    /// Capture length in seconds; defaults to the animation's native duration.
    #[arg(long)]
    duration: Option<f64>,

    /// Capture frame rate.
    #[arg(long, default_value_t = 60)]
    fps: u32,

    /// Container format string.
    #[arg(long, default_value = "video/webm")]
    format: String,

    /// Output video path.
    #[arg(long)]
    out: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Models(args) => cmd_models(args),
        Command::Info(args) => cmd_info(args),
        Command::Frame(args) => cmd_frame(args),
        Command::Export(args) => cmd_export(args),
    }
}

fn build_session(content: &Path) -> ViewerSession {
    let pack = ContentPack::load_dir(content);
    let backends = Backends {
        loader: Box::new(JsonModelLoader::new(content)),
        audio: Box::new(FfprobeAudioPlayer::new(content)),
        surfaces: Box::new(SolidSurfaceBackend::default()),
        recorders: Box::new(FfmpegRecorderBackend::new(content)),
    };
    ViewerSession::new(pack, backends, ViewerSessionOpts::default())
}

fn cmd_models(args: ModelsArgs) -> anyhow::Result<()> {
    let session = build_session(&args.content);
    let models = session.models();
    if models.is_empty() {
        eprintln!("no models in catalog");
        return Ok(());
    }
    for m in models {
        println!("{}\t{}\t{}", m.name, m.display_name, m.url);
    }
    Ok(())
}

fn cmd_info(args: InfoArgs) -> anyhow::Result<()> {
    let mut session = build_session(&args.content);
    session.load_model(&args.model)?;
    let model = session
        .model()
        .context("model not loaded (unexpected)")?;

    println!("{} ({})", model.display_name, model.name);
    println!("size: {}x{}", model.asset.width, model.asset.height);
    println!("animations:");
    for a in &model.asset.animations {
        println!("  {}\t{} ms", a.name, a.duration.0);
    }
    println!("skins:");
    for s in &model.asset.skins {
        println!("  {s}");
    }
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let mut session = build_session(&args.content);
    session.load_model(&args.model)?;
    if let Some(animation) = &args.animation {
        session.select_animation(animation);
    }

    let mut surface = session.preview_surface(Canvas {
        width: args.width,
        height: args.height,
    })?;
    let frame = surface.frame_at(FrameIndex(args.frame))?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image::save_buffer_with_format(
        &args.out,
        &frame.data,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_export(args: ExportArgs) -> anyhow::Result<()> {
    let mut session = build_session(&args.content);
    session.load_model(&args.model)?;
    if let Some(animation) = &args.animation {
        session.select_animation(animation);
    }

    let bitrate_bps = (args.bitrate_mbps * 1_000_000.0) as u32;
    let cfg = ExportConfig {
        width: args.width,
        height: args.height,
        bitrate_bps: if bitrate_bps == 0 { 5_000_000 } else { bitrate_bps },
        duration_secs: args.duration,
        frame_rate: Fps::new(args.fps, 1)?,
        format: args.format.clone(),
    };

    let id = session.export_current_view(cfg)?;
    session.run_until_idle()?;

    let artifact = session
        .take_artifacts()
        .pop()
        .with_context(|| format!("capture {} produced no artifact", id.0))?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(&args.out, &artifact.data)
        .with_context(|| format!("write video '{}'", args.out.display()))?;

    eprintln!(
        "wrote {} ({} frames, {} ms, {} bytes)",
        args.out.display(),
        artifact.frames,
        artifact.duration.0,
        artifact.data.len()
    );
    Ok(())
}

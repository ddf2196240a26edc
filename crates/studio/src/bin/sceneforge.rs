use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sceneforge_core::admission::{self, AdmissionDecision, VideoCandidate, VideoTarget};
use sceneforge_core::codec::MediaProbe;
use sceneforge_core::ffmpeg::{FfmpegTrimmer, FfprobeProbe};
use sceneforge_core::model_context::{CharacterOrientation, ModelContext};
use sceneforge_core::style::StylePreset;
use sceneforge_director::MotionDirectorApi;
use sceneforge_studio::{NoticeBus, RunOutcome, Studio, StudioConfig, VideoUpload};

#[derive(Parser, Debug)]
#[command(name = "sceneforge", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a queue from images and fill it with auto-motion prompts.
    Motion(MotionArgs),
    /// Check whether a video is admissible for the active model.
    Probe(ProbeArgs),
}

#[derive(Parser, Debug)]
struct MotionArgs {
    /// Scene images, in queue order.
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Style preset (defaults to MOTION_STYLE_PRESET).
    #[arg(long)]
    style: Option<String>,

    /// Free-form note for the motion director.
    #[arg(long)]
    note: Option<String>,

    /// Global reference video for motion-control models.
    #[arg(long)]
    reference_video: Option<PathBuf>,

    /// Character orientation: `image` or `video`.
    #[arg(long, default_value = "image")]
    orientation: String,

    /// Keep the reference video's audio.
    #[arg(long, default_value_t = false)]
    keep_audio: bool,
}

#[derive(Parser, Debug)]
struct ProbeArgs {
    video: PathBuf,

    /// Character orientation: `image` or `video`.
    #[arg(long, default_value = "image")]
    orientation: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    "sceneforge=info,sceneforge_studio=info,sceneforge_director=info".into()
                }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = StudioConfig::from_env().context("load configuration")?;
    let cli = Cli::parse();
    match cli.cmd {
        Command::Motion(args) => cmd_motion(&config, args).await,
        Command::Probe(args) => cmd_probe(&config, args).await,
    }
}

async fn cmd_motion(config: &StudioConfig, args: MotionArgs) -> anyhow::Result<()> {
    let notices = NoticeBus::default();
    let mut rx = notices.subscribe();
    let mut studio = Studio::from_config(config, notices)?;

    if let Some(style) = &args.style {
        studio.set_style(StylePreset::parse(style)?);
    }
    studio.set_user_note(args.note);
    studio.set_orientation(CharacterOrientation::parse(&args.orientation)?);
    studio.set_keep_audio(args.keep_audio);

    for path in &args.images {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("read image '{}'", path.display()))?;
        let mime_type = image_mime_type(path)?;
        studio.add_image(bytes, mime_type)?;
    }

    if let Some(video) = &args.reference_video {
        let upload = video_upload(video).await?;
        let trimmer = FfmpegTrimmer::new(std::env::temp_dir().join("sceneforge"));
        studio
            .admit_video(&FfprobeProbe, &trimmer, upload, VideoTarget::Global)
            .await?;
    }

    let director = MotionDirectorApi::new(config.director_url.clone(), config.director_timeout)?;
    let outcome = studio.auto_motion(&director).await;

    while let Ok(notice) = rx.try_recv() {
        tracing::info!(notice_level = ?notice.level, "{}", notice.message);
    }

    let report = match outcome? {
        RunOutcome::Applied(report) => report,
        RunOutcome::Discarded => anyhow::bail!("auto motion result was discarded"),
    };
    let output = json!({
        "model": studio.model().key,
        "style_preset": studio.style().as_str(),
        "negative_prompt": studio.negative_prompt(),
        "report": report,
        "queue": studio.snapshot(),
        "prompts": studio
            .queue()
            .scenes()
            .iter()
            .map(|s| s.effective_prompt())
            .collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn cmd_probe(config: &StudioConfig, args: ProbeArgs) -> anyhow::Result<()> {
    let ctx = ModelContext::lookup(&config.active_model)?;
    let orientation = CharacterOrientation::parse(&args.orientation)?;
    let upload = video_upload(&args.video).await?;
    let duration_secs = FfprobeProbe.duration_secs(&upload.path).await?;
    let candidate = VideoCandidate {
        path: upload.path,
        mime_type: upload.mime_type,
        size_bytes: upload.size_bytes,
        duration_secs,
    };

    let verdict = match admission::route(&candidate, &ctx, orientation)? {
        AdmissionDecision::Admit => json!({"decision": "admit"}),
        AdmissionDecision::Trim { target_secs } => {
            json!({"decision": "trim", "target_secs": target_secs})
        }
        AdmissionDecision::Reject(failure) => json!({"decision": "reject", "failure": failure}),
    };
    let output = json!({
        "model": ctx.key,
        "orientation": orientation.as_str(),
        "duration_secs": candidate.duration_secs,
        "size_bytes": candidate.size_bytes,
        "verdict": verdict,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn video_upload(path: &Path) -> anyhow::Result<VideoUpload> {
    let metadata = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("stat video '{}'", path.display()))?;
    Ok(VideoUpload {
        path: path.to_path_buf(),
        mime_type: video_mime_type(path).to_string(),
        size_bytes: metadata.len(),
    })
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

fn image_mime_type(path: &Path) -> anyhow::Result<&'static str> {
    match extension(path).as_str() {
        "jpg" | "jpeg" => Ok("image/jpeg"),
        "png" => Ok("image/png"),
        "webp" => Ok("image/webp"),
        other => anyhow::bail!("unsupported image extension '{other}' for '{}'", path.display()),
    }
}

/// Unknown extensions pass through and are rejected by admission.
fn video_mime_type(path: &Path) -> &'static str {
    match extension(path).as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        _ => "application/octet-stream",
    }
}

//! Lot Capture - command line driver
//!
//! Captures stills from image files standing in for a camera, files them into lots,
//! replays annotation action lists onto photos and exports the result.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use lot_capture::annotation::TextFont;
use lot_capture::config::{self, AppConfig};
use lot_capture::{storage, AnnotationCanvas, CaptureApp, EngineError, GroupingMode, ImageFile, ShutterFeedback, StillCamera};

/// Lot Capture - camera capture, lot grouping and photo annotation
#[derive(Parser, Debug)]
#[command(name = "lot-capture")]
#[command(about = "Capture photos into lots, annotate them and export the result")]
struct Cli {
    /// Configuration file (defaults to config.toml in the platform config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Capture stills into lots and export them
    Capture(CaptureArgs),
    /// Replay a JSON action list onto an image
    Annotate(AnnotateArgs),
    /// Write a default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug)]
struct CaptureArgs {
    /// Images served as camera frames, in order
    #[arg(long, num_args = 1..)]
    frames: Vec<PathBuf>,

    /// Files to add directly (also used when the camera cannot be opened)
    #[arg(long, num_args = 1..)]
    upload: Vec<PathBuf>,

    /// Grouping mode for the lots
    #[arg(short, long, default_value = "single_lot")]
    mode: GroupingMode,

    /// Number of shots (defaults to one per frame)
    #[arg(short = 'n', long)]
    count: Option<usize>,

    /// Zoom factor (1.0 - 5.0)
    #[arg(short, long, default_value = "1.0")]
    zoom: f32,

    /// Turn on the torch, or the simulated flash without one
    #[arg(long)]
    flash: bool,

    /// Export directory (defaults to the platform data dir)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct AnnotateArgs {
    /// Image to annotate
    image: PathBuf,

    /// JSON file with the action list
    #[arg(short, long)]
    actions: PathBuf,

    /// Font used for text blocks (overrides the config)
    #[arg(long)]
    font: Option<PathBuf>,

    /// Output file (defaults to annotated_<name> next to the input)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    match cli.command {
        Command::InitConfig { force } => init_config(cli.config.as_deref(), force),
        Command::Capture(args) => {
            let config = load_or_create_config(cli.config.as_deref())?;
            run_capture(config, args).await
        }
        Command::Annotate(args) => {
            let config = load_or_create_config(cli.config.as_deref())?;
            run_annotate(config, args).await
        }
    }
}

fn default_config_path() -> Result<PathBuf> {
    Ok(storage::get_config_dir()?.join("config.toml"))
}

/// Load configuration from file or fall back to defaults. An explicit path must load.
fn load_or_create_config(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        let config = config::load_config(path)?;
        info!("Loaded configuration from {:?}", path);
        return Ok(config);
    }
    if let Ok(config_path) = default_config_path() {
        if config_path.exists() {
            match config::load_config(&config_path) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", config_path);
                    return Ok(config);
                }
                Err(e) => warn!("Ignoring unreadable config {:?}: {:#}", config_path, e),
            }
        }
    }
    info!("Using default configuration");
    Ok(AppConfig::default())
}

fn init_config(explicit: Option<&Path>, force: bool) -> Result<()> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => default_config_path()?,
    };
    if path.exists() && !force {
        bail!("{:?} already exists (use --force to overwrite)", path);
    }
    config::save_config(&AppConfig::default(), &path)?;
    println!("{}", path.display());
    Ok(())
}

fn build_feedback(config: &AppConfig) -> ShutterFeedback {
    #[cfg(feature = "audio")]
    {
        ShutterFeedback::system(&config.feedback)
    }
    #[cfg(not(feature = "audio"))]
    {
        let _ = config;
        ShutterFeedback::silent()
    }
}

async fn run_capture(config: AppConfig, args: CaptureArgs) -> Result<()> {
    let feedback = build_feedback(&config);
    let mut app = CaptureApp::new(config, feedback)?;
    app.lots().lock().set_mode(0, args.mode)?;

    let camera = StillCamera::from_paths(&args.frames)?;
    match app.open_camera(Arc::new(camera)).await {
        Ok(()) => {
            if let Some(session) = app.session() {
                if args.zoom > 1.0 {
                    let zoom = session.set_zoom(args.zoom).await?;
                    info!("Zoom set to {:.2}", zoom);
                }
                if args.flash {
                    session.toggle_torch().await?;
                }
            }

            let shots = args.count.unwrap_or(args.frames.len());
            for _ in 0..shots {
                match app.capture().await {
                    Ok(Some(filed)) => info!("{} -> lot {} #{}", filed.name, filed.lot, filed.index),
                    Ok(None) => {}
                    Err(e @ EngineError::LimitExceeded { .. }) => {
                        warn!("Stopping capture: {}", e);
                        break;
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            app.close_camera();
        }
        Err(e) => warn!("Camera unavailable ({}), using uploads only", e),
    }

    if !args.upload.is_empty() {
        let report = app.upload(&args.upload)?;
        info!(
            "Uploaded {} file(s), {} over the limit, {} not images",
            report.accepted, report.truncated, report.skipped
        );
    }

    let out = match args.out {
        Some(dir) => dir,
        None => storage::get_data_dir()?.join("export"),
    };
    let manifest = app.export(&out)?;
    println!("{}", manifest.display());
    Ok(())
}

async fn run_annotate(mut config: AppConfig, args: AnnotateArgs) -> Result<()> {
    if let Some(font) = args.font {
        config.annotation.font_path = Some(font);
    }
    let font = TextFont::load_or_bundled(config.annotation.font_path.as_deref())?;

    let file = ImageFile::from_path(&args.image)?;
    let mut canvas = AnnotationCanvas::open(file, &config.annotation, font)
        .with_context(|| format!("Cannot annotate {:?}", args.image))?;
    let count = canvas.load_actions(&args.actions)?;
    let saved = canvas.save().await?;

    let out = args
        .out
        .unwrap_or_else(|| args.image.with_file_name(format!("annotated_{}", saved.name)));
    std::fs::write(&out, &saved.data).with_context(|| format!("Failed to write {:?}", out))?;
    info!("Applied {} action(s) -> {:?}", count, out);
    println!("{}", out.display());
    Ok(())
}

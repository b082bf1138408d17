//! Reframe CLI: command-line interface for vertical reframing.
//!
//! Usage:
//!   reframe plan [OPTIONS]         Compute a framing trajectory from detections
//!   reframe render <INPUT>         Render a 9:16 clip
//!   reframe batch <MANIFEST>       Render many clips concurrently
//!   reframe info <TRAJECTORY>      Show trajectory statistics
//!   reframe validate [OPTIONS]     Check a detection stream
//!   reframe check                  Check external tools
//!   reframe init                   Write the default framing config

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reframe_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "reframe",
    about = "Subject-aware 9:16 reframing for landscape video",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the framing trajectory for a clip without touching pixels
    Plan {
        /// Detection stream (JSONL)
        #[arg(short, long)]
        detections: PathBuf,

        /// Source frame width
        #[arg(long)]
        width: u32,

        /// Source frame height
        #[arg(long)]
        height: u32,

        /// Source frame rate
        #[arg(long, default_value = "30")]
        fps: f64,

        /// Number of frames to plan (default: last detection frame + 1)
        #[arg(long)]
        frames: Option<u64>,

        /// Framing config (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Zoom seed
        #[arg(long)]
        seed: Option<u64>,

        /// Output trajectory file
        #[arg(short, long, default_value = "trajectory.json")]
        output: PathBuf,
    },

    /// Render a vertical clip from a video file or image directory
    Render {
        /// Source video file or directory of frames
        input: PathBuf,

        /// Detection stream (JSONL)
        #[arg(short, long, required_unless_present = "trajectory")]
        detections: Option<PathBuf>,

        /// Replay a trajectory from `reframe plan` instead of planning
        #[arg(long, conflicts_with = "detections")]
        trajectory: Option<PathBuf>,

        /// Output video (.mp4/.mov/.mkv) or directory for PNG frames
        #[arg(short, long)]
        output: PathBuf,

        /// Frame rate for image-sequence input
        #[arg(long)]
        fps: Option<f64>,

        /// Framing config (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Zoom seed
        #[arg(long)]
        seed: Option<u64>,

        /// Output width (overrides config)
        #[arg(long)]
        width: Option<u32>,

        /// Output height (overrides config)
        #[arg(long)]
        height: Option<u32>,
    },

    /// Render every clip listed in a manifest
    Batch {
        /// Manifest file (JSON)
        manifest: PathBuf,

        /// Clips rendered at the same time
        #[arg(short, long, default_value = "2")]
        jobs: usize,
    },

    /// Show trajectory statistics
    Info {
        /// Trajectory file
        path: PathBuf,
    },

    /// Parse and normalize a detection stream
    Validate {
        /// Detection stream (JSONL)
        #[arg(short, long)]
        detections: PathBuf,

        /// Source frame width
        #[arg(long)]
        width: u32,

        /// Source frame height
        #[arg(long)]
        height: u32,

        /// Framing config (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Check external tools and configuration
    Check,

    /// Write the default framing config
    Init {
        /// Output file
        #[arg(short, long, default_value = "reframe.json")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let app = AppConfig::load();

    // Initialize logging
    let logging = app.logging.clone().with_verbose(cli.verbose);
    reframe_common::logging::init_logging(&logging)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))?;

    match cli.command {
        Commands::Plan {
            detections,
            width,
            height,
            fps,
            frames,
            config,
            seed,
            output,
        } => commands::plan::run(
            &app, detections, width, height, fps, frames, config, seed, output,
        ),
        Commands::Render {
            input,
            detections,
            trajectory,
            output,
            fps,
            config,
            seed,
            width,
            height,
        } => {
            let job = commands::render::RenderJob {
                input,
                detections,
                trajectory,
                output,
                fps,
                config,
                seed,
                width,
                height,
            };
            commands::render::run(app, job).await
        }
        Commands::Batch { manifest, jobs } => commands::batch::run(app, manifest, jobs).await,
        Commands::Info { path } => commands::info::run(path),
        Commands::Validate {
            detections,
            width,
            height,
            config,
        } => commands::validate::run(&app, detections, width, height, config),
        Commands::Check => commands::check::run(&app),
        Commands::Init { output, force } => commands::init::run(output, force),
    }
}

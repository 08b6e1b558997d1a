use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use narrated_shorts::config::Config;
use narrated_shorts::error::GenerationError;
use narrated_shorts::generator::{GeneratedVideo, Pipeline};
use narrated_shorts::init;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "narrated-shorts")]
#[command(about = "Turn text or a document into a short narrated stock-footage video", long_about = None)]
struct Args {
    /// Path to the JSON config file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a video from raw text
    Text {
        /// Text to narrate
        text: String,
    },
    /// Generate a video from a .pdf or .docx file
    File {
        /// Document to read
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config).await?;

    init::ensure_directories(&cfg).await?;

    if !init::check_ffmpeg(&cfg.ffmpeg_path).await {
        tracing::warn!("FFmpeg not found at '{}'. Please install FFmpeg.", cfg.ffmpeg_path);
    }

    let pipeline = Pipeline::from_config(&cfg).await?;

    let outcome = match args.command {
        Commands::Text { text } => pipeline.generate_from_text(&text).await,
        Commands::File { path } => {
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            pipeline.generate_from_file(bytes, &file_name).await
        }
    };

    std::process::exit(report(outcome)?);
}

fn report(outcome: Result<GeneratedVideo, GenerationError>) -> Result<i32> {
    match outcome {
        Ok(video) => {
            println!("{}", video.path.display());
            Ok(0)
        }
        Err(err) => {
            let body = serde_json::to_string(&err.body())?;
            eprintln!("{}", body);
            Ok(if err.status_code() < 500 { 2 } else { 1 })
        }
    }
}

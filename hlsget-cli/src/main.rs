use std::sync::Arc;

use clap::Parser;
use config::{FileConfig, PlaylistSource, ProgramConfig};
use error::AppError;
use hlsget_engine::{HlsPipeline, OnEvent, PipelineEvent};
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;
use tracing_subscriber::fmt::writer::MakeWriterExt;

mod cli;
mod config;
mod error;
mod utils;

use cli::CliArgs;
use utils::progress::ProgressManager;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() {
    if let Err(e) = bootstrap() {
        eprintln!("Error: {e}");
        // Log the full error for debugging
        error!(error = ?e, "Application failed");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn bootstrap() -> Result<(), AppError> {
    // Parse command-line arguments
    let args = CliArgs::parse();

    // Setup logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open("hlsget.log")?;

    let multi_writer = MakeWriterExt::and(std::io::stdout, log_file);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(multi_writer)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| AppError::Initialization(e.to_string()))?;

    info!("hlsget {} - resumable HLS downloader", env!("CARGO_PKG_VERSION"));

    let file_config = FileConfig::load(&args.config)?;
    let config = ProgramConfig::resolve(&args, file_config)?;

    info!(
        download_path = %config.download_path.display(),
        concurrency = config.concurrency,
        retries = config.retry_count,
        timeout_s = config.timeout.as_secs(),
        merge = ?config.merge_strategy,
        "Configuration loaded"
    );

    tokio::fs::create_dir_all(&config.download_path).await?;

    let mut pipeline = HlsPipeline::new(config.hls_config())?;
    if args.show_progress {
        let progress = ProgressManager::new();
        let on_event: OnEvent = Arc::new(move |event: PipelineEvent| progress.handle_event(event));
        pipeline = pipeline.with_event_handler(on_event);
    }

    let summary = match &config.source {
        PlaylistSource::Url(url) => {
            info!("Downloading playlist {url}");
            pipeline.download_from_url(url, &config.output_name).await?
        }
        PlaylistSource::File(path) => {
            if !path.is_file() {
                return Err(AppError::InvalidInput(format!(
                    "Playlist file not found: {}",
                    path.display()
                )));
            }
            info!("Reading playlist {}", path.display());
            pipeline.download_from_file(path, &config.output_name).await?
        }
    };

    info!(
        segments = summary.total_segments,
        fetched = summary.fetched,
        reused = summary.skipped,
        bytes = summary.bytes_written,
        "Saved {}",
        summary.output_path.display()
    );

    Ok(())
}

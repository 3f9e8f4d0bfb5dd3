//! Subclip - Clip Transcription Relay
//!
//! Entry point: runs the HTTP service, or processes clips straight from the
//! command line.

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use subclip::cli::{Args, Commands};
use subclip::config::Config;
use subclip::pipeline::Pipeline;
use subclip::server;
use subclip::types::{BatchRequest, ClipRequest};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration
    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new("config.toml").exists() {
                Config::from_file("config.toml")?
            } else {
                Config::default()
            }
        }
    };
    config.apply_env()?;

    // Setup logging to both console and file; the guard flushes the file on exit
    let _log_guard = setup_logging(args.verbose, &config.storage.log_dir)?;
    info!("Starting Subclip - Clip Transcription Relay");

    config.validate()?;

    let shutdown = CancellationToken::new();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, shutting down");
            ctrl_c.cancel();
        }
    });

    match args.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            let pipeline = Arc::new(Pipeline::new(&config)?);
            server::serve(&config.server, pipeline, shutdown).await?;
        }
        Commands::Process { url, id, no_dispatch } => {
            let pipeline = Pipeline::new(&config)?;
            let request = ClipRequest {
                secure_url: Some(url),
                new_public_id: Some(id),
                ..Default::default()
            };

            let result = if no_dispatch {
                pipeline.process_clip(&request, &shutdown).await?
            } else {
                pipeline.process_and_dispatch(&request, &shutdown).await?
            };
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Batch { input } => {
            info!("Reading batch from {}", input.display());
            let content = std::fs::read_to_string(&input)?;
            let batch: BatchRequest = serde_json::from_str(&content)?;

            let pipeline = Pipeline::new(&config)?;
            let outcome = pipeline.process_batch(&batch.clips, &shutdown).await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
    }

    info!("Subclip finished");
    Ok(())
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool, log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(log_dir, "subclip.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);

    // Determine log level
    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    // Create console layer
    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    // Create file layer
    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI colors in file

    // Setup layered subscriber
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized - console: {}, file: {}",
          log_level, log_dir.join("subclip.log").display());

    Ok(guard)
}

//! Embeddings - HTTP service and CLI computing Discogs-EffNet track embeddings.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use coral_embeddings::{EffnetConfig, EffnetModel, Extractor};
use coral_onnx::{ModelDescriptor, ModelRegistry, Provisioner};
use tracing_subscriber::EnvFilter;

mod config;
mod server;

use config::Config;
use server::{AppState, EmbeddingResponse};

/// Embeddings - audio track embedding service.
///
/// Downloads the embedding model on first start, then answers
/// POST /api/embeddings with one vector per audio file.
///
/// Configuration is read from ~/.coral/embeddings/config.yaml when present.
#[derive(Parser)]
#[command(name = "embeddings")]
#[command(about = "Audio track embedding service")]
#[command(version)]
struct Cli {
    /// Config file (default is ~/.coral/embeddings/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Listen address, overrides the config file
    #[arg(long, global = true)]
    listen: Option<String>,

    /// Model directory, overrides the config file
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service (default)
    Serve,
    /// Extract the embedding of one file and print it as JSON
    Extract {
        /// Audio file
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut cfg = Config::load(cli.config.as_deref())?;
    if let Some(listen) = cli.listen {
        cfg.listen = listen;
    }
    if let Some(model_dir) = cli.model_dir {
        cfg.model_dir = model_dir;
    }

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(&cfg).await.map(|_| ExitCode::SUCCESS),
        Commands::Extract { file } => extract(&cfg, file).await,
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Provisions the model into `registry` and builds the extractor around it.
async fn load_extractor(
    cfg: &Config,
    registry: &mut ModelRegistry,
    descriptor: &ModelDescriptor,
) -> Result<Extractor> {
    let provisioner = Provisioner::new(&cfg.model_dir);
    let session = provisioner
        .provision(registry, descriptor)
        .await
        .with_context(|| format!("failed to provision model {}", descriptor.name))?;

    let effnet_cfg = EffnetConfig::default().with_batch_size(cfg.extractor.batch_size);
    let model = EffnetModel::new(session, effnet_cfg)
        .with_context(|| format!("model {} rejected the warm-up batch", descriptor.name))?;
    Ok(Extractor::new(Arc::new(model)).with_config(&cfg.extractor))
}

async fn serve(cfg: &Config) -> Result<()> {
    let descriptor = cfg.model.descriptor();
    let mut registry = ModelRegistry::new();
    let extractor = load_extractor(cfg, &mut registry, &descriptor).await?;
    tracing::info!(
        model = %descriptor.name,
        dimension = extractor.dimension(),
        "extractor ready"
    );

    let state = AppState::new(Arc::new(extractor), &descriptor.name);
    let result = server::serve(&cfg.listen, state, shutdown_signal()).await;

    registry.release_all();
    tracing::info!("shutdown complete");
    result
}

async fn extract(cfg: &Config, file: PathBuf) -> Result<ExitCode> {
    let descriptor = cfg.model.descriptor();
    let mut registry = ModelRegistry::new();
    let extractor = load_extractor(cfg, &mut registry, &descriptor).await?;

    let result = tokio::task::spawn_blocking(move || extractor.extract(&file)).await?;
    registry.release_all();

    let response = EmbeddingResponse::from(result);
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(if response.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

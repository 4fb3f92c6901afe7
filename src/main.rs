use anyhow::Result;
use clap::Parser;
use sentinel_ingest::config::AcquisitionConfig;
use sentinel_ingest::pipeline::AcquisitionPipeline;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Fetch recent Sentinel Hub imagery for one location into object storage and Postgres.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Acquisition settings
    #[arg(long, default_value = "./inputs/acquisition.toml")]
    config: PathBuf,

    /// Number of days to look back
    #[arg(long, default_value_t = 1)]
    days: u32,

    /// End the window at the start of today instead of now
    #[arg(long)]
    history: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = AcquisitionConfig::read(&cli.config)?;

    let pipeline = AcquisitionPipeline::connect(config).await?;
    let summary = if cli.history {
        pipeline.run_history(cli.days).await?
    } else {
        pipeline.run(cli.days).await?
    };

    for (timestamp, error) in summary.failures() {
        warn!(%timestamp, %error, "Image not stored");
    }
    info!(
        window = %summary.window.interval(),
        attempted = summary.attempted(),
        succeeded = summary.succeeded(),
        skipped_duplicate = summary.skipped_duplicate(),
        failed = summary.failed(),
        "Acquisition finished"
    );

    Ok(())
}

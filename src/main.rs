//! rebazer daemon entry point

mod cli;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use rebazer::config::default_config_path;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Keeps pull requests rebased onto their target branch and merges them when green and approved
#[derive(Parser)]
#[command(name = "rebazer", version, about)]
struct Cli {
    /// Configuration file [default: <config dir>/rebazer/config.toml]
    #[arg(long, short, env = "REBAZER_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Run a single pass and exit
    #[arg(long)]
    once: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per event
    Json,
}

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "rebazer=info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    let config_path = match cli.config {
        Some(path) => path,
        None => default_config_path()
            .context("cannot determine the configuration directory, pass --config")?,
    };

    cli::run_daemon(&config_path, cli::DaemonOptions { once: cli.once })
        .await
        .with_context(|| format!("rebazer failed (config: {})", config_path.display()))
}

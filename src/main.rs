//! Pagelift - server-side rendering proxy backed by headless Chrome.
//!
//! Main entry point for the Pagelift CLI.

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, warn};

use pagelift_config::{Config, ConfigLoader, ConfigValidator};

mod server;
mod upstream;

/// Pagelift CLI.
#[derive(Parser)]
#[command(name = "pagelift")]
#[command(about = "Server-side rendering proxy backed by headless Chrome")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen host (overrides the config file)
    #[arg(long)]
    host: Option<String>,

    /// Listen port (overrides the config file)
    #[arg(long)]
    port: Option<u16>,

    /// Upstream origin URL (overrides the config file)
    #[arg(long)]
    upstream: Option<String>,

    /// Chrome devtools endpoint (overrides the config file)
    #[arg(long)]
    devtools: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ConfigLoader::load(path)?,
        None => Config::default(),
    };

    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(upstream) = cli.upstream {
        config.upstream.url = upstream;
    }
    if let Some(devtools) = cli.devtools {
        config.render.devtools_url = devtools;
    }

    server::init_tracing(&config.logging)?;

    let report = ConfigValidator::validate(&config)?;
    for warning in &report.warnings {
        warn!("{}: {}", warning.path, warning.message);
    }
    if !report.is_valid() {
        for err in &report.errors {
            error!("{}: {}", err.path, err.message);
        }
        anyhow::bail!("invalid configuration");
    }

    server::run(config).await
}

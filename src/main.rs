//! Standalone repository adapter CLI binary.

use anyhow::Result;
use clap::{Parser, Subcommand};
use pypi_depot::config::Config;
use pypi_depot::run_server;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pypi-depot")]
#[command(about = "PyPI simple-repository adapter over a generic object store")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the repository server
    Start {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(long)]
        port: Option<u16>,

        /// Data directory backing the object store
        #[arg(long)]
        data: Option<PathBuf>,

        /// Upstream index URL; enables pull-through mirroring
        #[arg(long)]
        upstream: Option<String>,

        /// Serve stale cached content when the upstream fails
        #[arg(long)]
        stale_read_through: bool,

        /// Path to a JSON configuration file
        #[arg(long, default_value = "config.json")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            host,
            port,
            data,
            upstream,
            stale_read_through,
            config,
        } => {
            let mut config = Config::load_or_default(config);
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(data) = data {
                config.storage.data_dir = data;
            }
            if let Some(upstream) = upstream {
                config.upstream.enabled = true;
                config.upstream.url = upstream;
            }
            if stale_read_through {
                config.upstream.stale_read_through = true;
            }
            run_server(config).await
        }
    }
}

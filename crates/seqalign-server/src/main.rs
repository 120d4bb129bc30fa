//! SeqAlign Server - Main entry point

use anyhow::Result;
use clap::{Parser, Subcommand};
use seqalign_common::logging::{init_logging, LogConfig};
use tracing::info;

use seqalign_server::{api, config::Config};

/// SeqAlign - asynchronous BLAST and minimap2 alignment service
#[derive(Parser, Debug)]
#[command(name = "seqalign-server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Process mode (defaults to `serve`)
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Run the HTTP API (and the local worker pool with QUEUE_BACKEND=local)
    Serve,
    /// Run queue workers against the PostgreSQL backend
    Worker,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Serve);

    // Environment variables take precedence over these defaults
    let log_config = LogConfig::builder()
        .log_file_prefix("seqalign-server")
        .filter_directives("seqalign_server=debug,tower_http=debug,sqlx=warn,apalis=info")
        .build()
        .merge_env()?;

    let _guard = init_logging(&log_config)?;

    info!("Starting SeqAlign ({:?})", command);

    let config = Config::load()?;
    info!(
        "Configuration loaded - queue backend {:?} with {} workers",
        config.queue.backend, config.queue.workers
    );

    match command {
        Commands::Serve => api::serve(config).await,
        Commands::Worker => api::run_worker(config).await,
    }
}

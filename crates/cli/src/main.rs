//! prodrec CLI
//!
//! Main entry point for the product recommender.
//! Loads a product catalog into a vector index and answers similarity queries.

mod commands;

use clap::{Parser, Subcommand};
use commands::{IngestCommand, RecommendCommand, RunCommand, StatsCommand};
use prodrec_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;

/// prodrec - product recommendations from a vector index
#[derive(Parser, Debug)]
#[command(name = "prodrec")]
#[command(about = "Product recommendations from a vector index", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "PRODREC_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "PRODREC_CONFIG")]
    config: Option<PathBuf>,

    /// Index backend (memory, pinecone)
    #[arg(short, long, global = true, env = "PRODREC_BACKEND")]
    backend: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Reset the index, ingest the catalog, and run queries
    Run(RunCommand),

    /// Reset the index and ingest the catalog
    Ingest(IngestCommand),

    /// Query an existing index
    Recommend(RecommendCommand),

    /// Show index statistics
    Stats(StatsCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    let config = AppConfig::load()?;

    let config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.backend,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("prodrec starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Backend: {}", config.backend);

    config.validate()?;
    config.ensure_prodrec_dir()?;

    let command_name = match &cli.command {
        Commands::Run(_) => "run",
        Commands::Ingest(_) => "ingest",
        Commands::Recommend(_) => "recommend",
        Commands::Stats(_) => "stats",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Run(cmd) => cmd.execute(&config).await,
        Commands::Ingest(cmd) => cmd.execute(&config).await,
        Commands::Recommend(cmd) => cmd.execute(&config).await,
        Commands::Stats(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}

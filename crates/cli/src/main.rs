//! Recall CLI
//!
//! Main entry point for the recall command-line tool.
//! Runs retrieval-augmentation searches against vector stores.

mod commands;

use clap::{Parser, Subcommand};
use commands::{RewriteCommand, SearchCommand};
use recall_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;

/// Recall - retrieval pipeline for vector-store search
#[derive(Parser, Debug)]
#[command(name = "recall")]
#[command(about = "Query rewriting, retrieval and reranking over vector stores", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "RECALL_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "RECALL_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// LLM provider (openai, ollama)
    #[arg(short, long, global = true, env = "RECALL_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "RECALL_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search a vector store through the retrieval pipeline
    Search(SearchCommand),

    /// Show the variants a rewriting strategy produces
    Rewrite(RewriteCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Load base configuration from environment and config file
    let mut config = AppConfig::load()?;

    // An explicit --config wins over the default location
    if let Some(path) = cli.config.as_deref() {
        if config.config_file.as_deref() != Some(path) {
            config = config.merge_yaml(path)?;
        }
    }

    // Apply CLI overrides
    let mut config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );
    config.json_logs |= cli.log_json;

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color, config.json_logs)?;

    tracing::info!("Recall CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    config.validate()?;

    let command_name = match &cli.command {
        Commands::Search(_) => "search",
        Commands::Rewrite(_) => "rewrite",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Search(cmd) => cmd.execute(&config).await,
        Commands::Rewrite(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}

//! ragchat CLI
//!
//! Main entry point for the ragchat command-line tool: ingest documents into
//! a vector index and chat with them.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, ChatCommand, DebugCommand, IngestCommand, StatsCommand};
use ragchat_core::{config::AppConfig, config::load_env_file, logging, AppResult};
use ragchat_knowledge::Credentials;
use std::path::PathBuf;

/// ragchat - chat with your documents
#[derive(Parser, Debug)]
#[command(name = "ragchat")]
#[command(about = "Retrieval-augmented chat over your documents", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "RAGCHAT_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "RAGCHAT_CONFIG")]
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

    /// LLM provider (openai, ollama)
    #[arg(short, long, global = true, env = "RAGCHAT_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "RAGCHAT_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Chunk, embed and upsert documents into the index
    Ingest(IngestCommand),

    /// Ask a single question
    Ask(AskCommand),

    /// Interactive chat session
    Chat(ChatCommand),

    /// Show namespace statistics
    Stats(StatsCommand),

    /// Show resolved configuration
    Debug(DebugCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // .env first so clap's env fallbacks see it
    let env_file = load_env_file();

    let cli = Cli::parse();

    // Load base configuration from environment
    let config = AppConfig::load()?;

    // Apply CLI overrides
    let config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("ragchat CLI starting");
    if let Some(path) = env_file {
        tracing::debug!("Loaded environment from {:?}", path);
    }
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    // Ensure .ragchat directory exists
    config.ensure_state_dir()?;

    let credentials = Credentials::from_env();

    let command_name = match &cli.command {
        Commands::Ingest(_) => "ingest",
        Commands::Ask(_) => "ask",
        Commands::Chat(_) => "chat",
        Commands::Stats(_) => "stats",
        Commands::Debug(_) => "debug",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    // Route to command handlers
    let result = match cli.command {
        Commands::Ingest(cmd) => cmd.execute(&config, &credentials).await,
        Commands::Ask(cmd) => cmd.execute(&config, &credentials).await,
        Commands::Chat(cmd) => cmd.execute(&config, &credentials).await,
        Commands::Stats(cmd) => cmd.execute(&config, &credentials).await,
        Commands::Debug(cmd) => cmd.execute(&config, &credentials),
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}

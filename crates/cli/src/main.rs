//! zulipgpt CLI — the main entry point.
//!
//! Commands:
//! - `init`     — Write a default config file
//! - `run`      — Connect to Zulip and answer messages
//! - `chat`     — Talk to the assistant from the terminal
//! - `check`    — Validate config and credentials
//! - `contexts` — Manage named contexts offline

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use zulipgpt_config::{AppConfig, CONFIG_FILE, ConfigError};

mod commands;

#[derive(Parser)]
#[command(
    name = "zulipgpt",
    about = "zulipgpt — an LLM chat assistant for Zulip",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the config file
    #[arg(short, long, global = true, env = "ZULIPGPT_CONFIG", default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Init,

    /// Connect to Zulip and answer messages
    Run,

    /// Chat with the assistant in the terminal
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Validate configuration and credentials
    Check,

    /// Manage named contexts
    Contexts {
        #[command(subcommand)]
        action: ContextAction,
    },
}

#[derive(Subcommand)]
enum ContextAction {
    /// List all contexts
    List,

    /// Create or replace a context
    Set {
        name: String,
        /// Context text; remaining words are joined with spaces
        #[arg(required = true, num_args = 1..)]
        value: Vec<String>,
    },

    /// Delete a context
    Unset { name: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let loaded = AppConfig::load_with(&cli.config, |key| std::env::var(key).ok());

    // RUST_LOG wins, then --verbose, then the configured level
    let filter = if cli.verbose {
        "debug".to_string()
    } else {
        loaded
            .as_ref()
            .map(|config| config.log_level.clone())
            .unwrap_or_else(|_| "info".to_string())
    };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false);
    if cli.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match cli.command {
        Commands::Init => commands::init::run(&cli.config)?,
        Commands::Check => commands::check::run(&cli.config, loaded).await?,
        Commands::Run => commands::run::run(loaded_config(loaded)?).await?,
        Commands::Chat { message } => commands::chat::run(loaded_config(loaded)?, message).await?,
        Commands::Contexts { action } => {
            let config = loaded_config(loaded)?;
            match action {
                ContextAction::List => commands::contexts::list(&config).await?,
                ContextAction::Set { name, value } => {
                    commands::contexts::set(&config, &name, &value.join(" ")).await?
                }
                ContextAction::Unset { name } => commands::contexts::unset(&config, &name).await?,
            }
        }
    }

    Ok(())
}

fn loaded_config(loaded: Result<AppConfig, ConfigError>) -> Result<AppConfig, String> {
    loaded.map_err(|e| format!("Failed to load config: {e}"))
}

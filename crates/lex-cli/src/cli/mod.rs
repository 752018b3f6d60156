//! CLI entry and dispatch.

use anyhow::{Context, Result};
use clap::Parser;
use lex_core::config::Config;
use lex_core::core::interrupt;

mod commands;

#[derive(Parser)]
#[command(name = "lex")]
#[command(version)]
#[command(about = "Terminal client for Lex, the SuperCar virtual sales assistant")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override the backend base URL from config
    #[arg(long, value_name = "URL")]
    backend_url: Option<String>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Interactive chat (default)
    Chat,

    /// Send a single query and stream the reply to stdout
    Exec {
        /// The query to send to the assistant
        #[arg(short, long)]
        prompt: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    interrupt::init();

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    let mut config = Config::load().context("load config")?;

    if let Some(url) = cli.backend_url.as_deref() {
        let trimmed = url.trim();
        if !trimmed.is_empty() {
            config.backend_url = trimmed.to_string();
        }
    }

    // Keep the guard alive so buffered log lines flush on exit.
    let _log_guard = crate::logging::init(&config);
    tracing::debug!(backend_url = %config.backend_url, "lex starting");

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => commands::chat::run(&config),
        Commands::Exec { prompt } => commands::exec::run(&prompt, &config).await,
        Commands::Config { command } => match command {
            ConfigCommands::Path => commands::config::path(),
        },
    }
}

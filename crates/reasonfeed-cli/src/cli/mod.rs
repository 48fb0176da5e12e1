//! CLI entry and dispatch.

use anyhow::{Context, Result};
use clap::Parser;
use reasonfeed_core::config::{self, BASE_URL_ENV};
use tracing::debug;

mod commands;
mod logging;
mod render;

#[derive(Parser)]
#[command(name = "reasonfeed")]
#[command(version)]
#[command(about = "Live reasoning viewer for agent conversations")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Agent API base URL (overrides the config file)
    #[arg(long, global = true, value_name = "URL", env = BASE_URL_ENV)]
    base_url: Option<String>,

    /// Bearer token (overrides the config file and REASONFEED_TOKEN)
    #[arg(long, global = true, value_name = "TOKEN")]
    token: Option<String>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Submit one message and print the ids the server assigned
    Send {
        /// The message text
        #[arg(short, long)]
        message: String,
    },

    /// Follow the conversation and the agent's reasoning live
    Watch {
        /// Do not read messages to submit from stdin
        #[arg(long = "no-stdin")]
        no_stdin: bool,

        /// Exit after the first non-empty view is printed
        #[arg(long)]
        once: bool,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    let Cli {
        command,
        base_url,
        token,
    } = cli;

    if let Commands::Config { command } = &command {
        return match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
        };
    }

    let mut config = config::Config::load().context("load config")?;
    if let Some(url) = base_url.filter(|url| !url.trim().is_empty()) {
        config.base_url_override = Some(url);
    }
    if let Some(token) = token.filter(|token| !token.trim().is_empty()) {
        config.token = Some(token);
    }

    let _log_guard = logging::init(&config);
    debug!(path = %config::paths::config_path().display(), "config loaded");

    match command {
        Commands::Send { message } => commands::send::run(&config, &message).await,
        Commands::Watch { no_stdin, once } => {
            commands::watch::run(
                &config,
                commands::watch::WatchOptions {
                    read_stdin: !no_stdin,
                    once,
                },
            )
            .await
        }
        Commands::Config { .. } => Ok(()),
    }
}

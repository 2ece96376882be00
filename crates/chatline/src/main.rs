// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chatline - developer shell for the chat synchronization core.
//!
//! This is the binary entry point: an interactive visitor shell against the
//! in-memory store, and configuration checks.

mod shell;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use chatline_config::{ChatlineConfig, ConfigError};

/// Chatline - developer shell for the chat synchronization core.
#[derive(Parser, Debug)]
#[command(name = "chatline", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Chat as a visitor against an in-memory store with a simulated operator.
    Shell {
        /// Entry parameter describing how the chat was opened, as `key=value`
        /// (e.g. `--entry source=gems --entry 'wishlist=[...]'`).
        #[arg(long = "entry", value_parser = parse_entry_param)]
        entry: Vec<(String, String)>,
    },
    /// Inspect Chatline configuration.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load and validate the configuration, reporting every problem.
    Check,
}

fn parse_entry_param(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))
}

fn load_config(path: Option<&PathBuf>) -> Result<ChatlineConfig, Vec<ConfigError>> {
    match path {
        Some(path) if !path.exists() => Err(vec![ConfigError::Other(format!(
            "config file {} does not exist",
            path.display()
        ))]),
        Some(path) => chatline_config::load_and_validate_path(path),
        None => chatline_config::load_and_validate(),
    }
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "chatline={log_level},chatline_sync={log_level},chatline_storage={log_level},warn"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(errors) => {
            chatline_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Shell { entry }) => {
            init_tracing(&config.logging.level);
            if let Err(e) = shell::run_shell(config, entry).await {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Config {
            command: ConfigCommand::Check,
        }) => {
            println!("chatline: configuration is valid");
            println!("  logging.level         = {}", config.logging.level);
            println!("  visitor.identity_path = {}", config.visitor.identity_path);
            println!("  greeting.enabled      = {}", config.greeting.enabled);
            println!("  greeting.lease_ttl_ms = {}", config.greeting.lease_ttl_ms);
            println!("  store.media_base_url  = {}", config.store.media_base_url);
        }
        None => {
            println!("chatline: use --help for available commands");
        }
    }
}

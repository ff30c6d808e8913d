//! hiddenchat - one-to-one chat over an anonymizing overlay
//!
//! A CLI that hosts or joins a single chat session routed through the local
//! SOCKS5 proxy of an overlay network such as Tor.

mod commands;

use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{AddressCommand, ChatCommand, CommandExecutor, ConfigCommand};

/// hiddenchat - one-to-one chat over an anonymizing overlay
///
/// One side hosts (listens on the chat port published as its onion service),
/// the other joins by dialing that address through the SOCKS5 proxy.
#[derive(Parser)]
#[command(name = "hiddenchat")]
#[command(version)]
#[command(about = "Anonymous point-to-point chat over a SOCKS5 overlay")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Host or join a chat session
    Chat(ChatCommand),

    /// Print your rendezvous address
    Address(AddressCommand),

    /// Show the effective configuration
    Config(ConfigCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        // The TUI owns the terminal, so the chat session logs to a file.
        Commands::Chat(cmd) => init_file_logging(&cmd.log_path())?,
        _ => init_stderr_logging(),
    }

    match cli.command {
        Commands::Chat(cmd) => cmd.execute(),
        Commands::Address(cmd) => cmd.execute(),
        Commands::Config(cmd) => cmd.execute(),
    }
}

/// `RUST_LOG` wins; otherwise `info`.
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn init_file_logging(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}

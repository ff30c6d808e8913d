//! Command module - Strategy pattern for CLI commands.
//!
//! Each command is a separate module implementing the `CommandExecutor` trait.

mod address;
mod chat;
mod config;

pub use address::AddressCommand;
pub use chat::ChatCommand;
pub use config::ConfigCommand;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use hiddenchat::chat::{ChatConfig, LocalIdentity, ProxyEndpoint};

/// Trait for command execution - Strategy pattern.
///
/// Each command struct holds its parsed arguments and implements
/// this trait to define its execution logic.
pub trait CommandExecutor {
    /// Executes the command with its parsed arguments.
    fn execute(&self) -> Result<()>;
}

/// Options shared by every command that needs the configuration.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Configuration file (default: <config dir>/hiddenchat/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// SOCKS5 proxy as host:port (overrides the config file)
    #[arg(long)]
    pub proxy: Option<String>,

    /// Chat port used for listening and dialing (overrides the config file)
    #[arg(long)]
    pub port: Option<u16>,
}

impl ConfigArgs {
    /// Load the configuration file and apply command-line overrides.
    pub fn resolve(&self) -> Result<ChatConfig> {
        let mut config = match &self.config {
            Some(path) => ChatConfig::load_from(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => ChatConfig::load().context("Failed to load config")?,
        };

        if let Some(proxy) = &self.proxy {
            config.proxy = ProxyEndpoint::parse(proxy).context("Invalid --proxy")?;
        }
        if let Some(port) = self.port {
            config.chat_port = port;
        }

        config.validate()?;
        Ok(config)
    }

    /// Path of the config file these options point at.
    pub fn config_path(&self) -> Option<PathBuf> {
        self.config.clone().or_else(ChatConfig::config_path)
    }
}

/// Read our rendezvous address from the configured or default `hostname` file.
pub fn load_identity(config: &ChatConfig) -> Result<LocalIdentity> {
    let path = match &config.hostname_file {
        Some(path) => path.clone(),
        None => LocalIdentity::default_path()?,
    };
    Ok(LocalIdentity::load(&path)?)
}

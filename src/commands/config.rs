//! Show or write the effective configuration.

use anyhow::{bail, Context, Result};
use clap::Args;

use super::{CommandExecutor, ConfigArgs};

/// Print the effective configuration.
///
/// With --write, the configuration (including any --proxy/--port overrides)
/// is saved to the config file.
#[derive(Args, Debug)]
pub struct ConfigCommand {
    /// Save the effective configuration to the config file
    #[arg(long)]
    pub write: bool,

    #[command(flatten)]
    pub settings: ConfigArgs,
}

impl CommandExecutor for ConfigCommand {
    fn execute(&self) -> Result<()> {
        let config = self.settings.resolve()?;
        let path = self.settings.config_path();

        match &path {
            Some(path) => println!("# {}", path.display()),
            None => println!("# no config directory available"),
        }
        print!(
            "{}",
            toml::to_string_pretty(&config).context("Failed to serialize config")?
        );

        if self.write {
            let Some(path) = path else {
                bail!("No config directory available; pass --config <file>");
            };
            config
                .save_to(&path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Configuration written to {}", path.display());
        }

        Ok(())
    }
}

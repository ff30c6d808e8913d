//! Print the local rendezvous address.

use anyhow::Result;
use clap::Args;

use super::{load_identity, CommandExecutor, ConfigArgs};

/// Show the address peers use to reach you.
#[derive(Args, Debug)]
pub struct AddressCommand {
    #[command(flatten)]
    pub settings: ConfigArgs,
}

impl CommandExecutor for AddressCommand {
    fn execute(&self) -> Result<()> {
        let config = self.settings.resolve()?;
        let identity = load_identity(&config)?;
        println!("{}", identity.address());
        Ok(())
    }
}

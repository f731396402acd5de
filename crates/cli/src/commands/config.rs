// `livedraft config` — show the resolved client configuration.

use anyhow::{Context, Result};
use clap::Args;

use livedraft_client::config::{global_config_path, ClientConfig};

#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Print the config file path instead of its contents.
    #[arg(long)]
    path: bool,
}

pub fn run(args: ConfigArgs) -> Result<()> {
    if args.path {
        let path = global_config_path().context("could not determine home directory")?;
        println!("{}", path.display());
        return Ok(());
    }

    let config = ClientConfig::load();
    let rendered = toml::to_string_pretty(&config).context("failed to render config")?;
    print!("{rendered}");
    Ok(())
}

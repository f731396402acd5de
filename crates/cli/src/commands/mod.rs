// CLI subcommand dispatch.

use clap::Subcommand;

pub mod config;
pub mod watch;

#[derive(Subcommand)]
pub enum Command {
    /// Join a document room and stream activity
    Watch(watch::WatchArgs),
    /// Show the resolved client configuration
    Config(config::ConfigArgs),
}

pub fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Watch(args) => watch::run(args),
        Command::Config(args) => config::run(args),
    }
}

mod artifacts;
mod cmd;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use vorpal_sdk::config::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .without_time()
    .init();

  let cli = Cli::parse();

  match cli.command {
    Command::Start(args) => cmd::cmd_start(args).await,
  }
}

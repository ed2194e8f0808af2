//! Implementation of the `vorpal-config start` command.
//!
//! Builds the requested artifact graph through the agent, then serves the
//! collected graph until interrupted.

use anyhow::{Context, Result, bail};
use tracing::info;

use vorpal_sdk::config::ContextArgs;

use crate::artifacts;

pub async fn cmd_start(args: ContextArgs) -> Result<()> {
  let context = args.into_context().context("Failed to configure context")?;
  let name = context.get_artifact_name().to_string();

  if !artifacts::NAMES.contains(&name.as_str()) {
    bail!("Unknown artifact: {} (available: {})", name, artifacts::NAMES.join(", "));
  }

  let digest = artifacts::build(&context, &name)
    .await
    .with_context(|| format!("Failed to build artifact: {}", name))?;

  info!(
    artifact = %name,
    digest = %digest,
    artifacts = context.get_artifact_store().len(),
    "artifact graph ready"
  );

  context.run().await.context("Failed to serve artifact graph")?;

  Ok(())
}

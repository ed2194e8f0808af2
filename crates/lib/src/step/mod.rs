//! Step builders.
//!
//! Each builder is a pure function of its inputs that produces an
//! [`ArtifactStep`]. [`shell`] picks the strategy for the active system:
//!
//! - Darwin targets run under [`bash`] with no confinement.
//! - Linux targets run under [`bwrap`] inside a namespace sandbox whose
//!   root filesystem comes from a well-known rootfs artifact.
//!
//! [`docker`] is used by image-producing artifacts.

mod bash;
mod bwrap;
mod docker;

pub use bash::bash;
pub use bwrap::bwrap;
pub use docker::docker;

use crate::artifact::alias::select_for_system;
use crate::artifact::{ArtifactStep, ArtifactStepSecret, get_env_key};
use crate::consts::DEFAULT_PATH;
use crate::context::{ConfigContext, ContextError};
use crate::system::ArtifactSystem;

/// Rootfs aliases per Linux system.
pub const SANDBOX_ROOTFS_ALIASES: [(ArtifactSystem, &str); 2] = [
  (ArtifactSystem::Aarch64Linux, crate::consts::DEFAULT_SANDBOX_ALIAS),
  (ArtifactSystem::X8664Linux, crate::consts::DEFAULT_SANDBOX_ALIAS),
];

/// Environment split into pass-through entries and the assembled PATH.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StepEnvironment {
  pub variables: Vec<(String, String)>,
  pub path: String,
}

/// Assemble the step environment.
///
/// PATH is `[declared PATH]:[<dep>/bin ...]:DEFAULT_PATH` with empty
/// segments dropped. Every other `KEY=VALUE` entry passes through in order.
pub(crate) fn step_environment(artifacts: &[String], environments: &[String]) -> StepEnvironment {
  let mut declared_path = Vec::new();
  let mut variables = Vec::new();

  for entry in environments {
    let (key, value) = entry.split_once('=').unwrap_or((entry.as_str(), ""));
    if key == "PATH" {
      declared_path.push(value.to_string());
    } else {
      variables.push((key.to_string(), value.to_string()));
    }
  }

  let mut segments: Vec<String> = declared_path;
  segments.extend(artifacts.iter().map(|digest| format!("{}/bin", get_env_key(digest))));
  segments.push(DEFAULT_PATH.to_string());

  let path = segments
    .into_iter()
    .filter(|segment| !segment.is_empty())
    .collect::<Vec<_>>()
    .join(":");

  StepEnvironment { variables, path }
}

pub(crate) fn strict_script(script: &str) -> String {
  format!("#!/bin/bash\nset -euo pipefail\n\n{}\n", script.trim_end())
}

/// Build a step for the context's active system.
///
/// Linux steps fetch the sandbox rootfs artifact by alias first.
pub async fn shell(
  context: &ConfigContext,
  artifacts: Vec<String>,
  environments: Vec<String>,
  script: &str,
  secrets: Vec<ArtifactStepSecret>,
) -> Result<ArtifactStep, ContextError> {
  let system = context.get_system();

  if system.is_darwin() {
    return Ok(bash(artifacts, environments, script, secrets));
  }

  if system.is_linux() {
    let alias = select_for_system(&SANDBOX_ROOTFS_ALIASES, system)?;
    let rootfs = context.fetch_artifact_alias(alias).await?;
    return Ok(bwrap(vec![], artifacts, environments, Some(rootfs), script, secrets));
  }

  Err(ContextError::UnsupportedSystem(system))
}

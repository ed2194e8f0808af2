//! Long-running process artifacts.
//!
//! The artifact installs three scripts next to each other:
//!
//! - `bin/<name>-start` launches the entrypoint in the background and
//!   records its PID in `$VORPAL_OUTPUT/<name>.pid`.
//! - `bin/<name>-stop` signals the recorded PID and removes the file.
//! - `bin/<name>-logs` follows `$VORPAL_OUTPUT/<name>.log`.

use crate::context::{ConfigContext, ContextError};
use crate::step;
use crate::system::ArtifactSystem;

use super::builder::ArtifactBuilder;
use super::types::ArtifactStepSecret;
use super::{bin_path, write_bin};

#[derive(Debug, Clone)]
pub struct ProcessBuilder {
  name: String,
  entrypoint: String,
  arguments: Vec<String>,
  artifacts: Vec<String>,
  secrets: Vec<ArtifactStepSecret>,
  systems: Vec<ArtifactSystem>,
}

impl ProcessBuilder {
  pub fn new(name: &str, entrypoint: &str, systems: Vec<ArtifactSystem>) -> Self {
    Self {
      name: name.to_string(),
      entrypoint: entrypoint.to_string(),
      arguments: vec![],
      artifacts: vec![],
      secrets: vec![],
      systems,
    }
  }

  pub fn with_arguments(mut self, arguments: Vec<String>) -> Self {
    self.arguments = arguments;
    self
  }

  pub fn with_artifacts(mut self, artifacts: Vec<String>) -> Self {
    self.artifacts = artifacts;
    self
  }

  pub fn with_secrets(mut self, secrets: Vec<ArtifactStepSecret>) -> Self {
    self.secrets = secrets;
    self
  }

  pub fn script(&self) -> String {
    let name = &self.name;
    let pid = format!("$VORPAL_OUTPUT/{}.pid", name);
    let log = format!("$VORPAL_OUTPUT/{}.log", name);

    let mut command = vec![self.entrypoint.clone()];
    command.extend(self.arguments.iter().cloned());
    let command = command.join(" ");

    let path = match bin_path(&self.artifacts) {
      path if path.is_empty() => "\\$PATH".to_string(),
      path => format!("{}:\\$PATH", path),
    };

    let start = format!(
      r#"#!/bin/bash
set -euo pipefail

export PATH="{path}"

if [ -f "{pid}" ] && kill -0 "\$(cat "{pid}")" 2>/dev/null; then
  echo "{name} is already running (pid \$(cat "{pid}"))"
  exit 0
fi

nohup {command} >> "{log}" 2>&1 &
echo \$! > "{pid}"
echo "{name} started (pid \$!)""#
    );

    let stop = format!(
      r#"#!/bin/bash
set -euo pipefail

if [ ! -f "{pid}" ]; then
  echo "{name} is not running"
  exit 0
fi

kill "\$(cat "{pid}")" 2>/dev/null || true
rm -f "{pid}"
echo "{name} stopped""#
    );

    let logs = format!(
      r#"#!/bin/bash
set -euo pipefail

if [ ! -f "{log}" ]; then
  echo "no logs for {name}"
  exit 1
fi

tail -f "{log}""#
    );

    [
      "mkdir -pv $VORPAL_OUTPUT/bin".to_string(),
      write_bin(&format!("{}-start", name), &start),
      write_bin(&format!("{}-stop", name), &stop),
      write_bin(&format!("{}-logs", name), &logs),
    ]
    .join("\n")
  }

  pub async fn build(self, context: &ConfigContext) -> Result<String, ContextError> {
    let script = self.script();
    let step = step::shell(context, self.artifacts.clone(), vec![], &script, self.secrets).await?;

    ArtifactBuilder::new(&self.name, vec![step], self.systems).build(context).await
  }
}

//! Shell environment artifacts.
//!
//! [`DevelopmentEnvironmentBuilder`] produces a project shell: `bin/activate`
//! is sourced to put dependencies on `PATH` and export declared variables,
//! `bin/deactivate` restores what was there before.
//!
//! [`UserEnvironmentBuilder`] produces a user profile that also manages a
//! set of symlinks, installed and removed by
//! `bin/vorpal-activate-symlinks` and `bin/vorpal-deactivate-symlinks`.

use crate::context::{ConfigContext, ContextError};
use crate::step;
use crate::system::ArtifactSystem;

use super::builder::ArtifactBuilder;
use super::types::ArtifactStepSecret;
use super::{bin_path, write_bin};

const BACKUP_PREFIX: &str = "VORPAL_SHELL_BACKUP_";

/// Split `KEY=VALUE` entries, keeping declared PATH values apart.
fn split_environments(environments: &[String]) -> (Vec<(String, String)>, Vec<String>) {
  let mut variables = Vec::new();
  let mut paths = Vec::new();

  for entry in environments {
    let (key, value) = entry.split_once('=').unwrap_or((entry.as_str(), ""));
    if key == "PATH" {
      paths.push(value.to_string());
    } else {
      variables.push((key.to_string(), value.to_string()));
    }
  }

  (variables, paths)
}

/// Runtime PATH: own bin, dependencies, declared entries, then the caller's.
fn activation_path(own_bin: Option<&str>, artifacts: &[String], declared: &[String]) -> String {
  let mut segments: Vec<String> = own_bin.map(str::to_string).into_iter().collect();
  segments.push(bin_path(artifacts));
  segments.extend(declared.iter().cloned());
  segments.push("\\$PATH".to_string());

  segments
    .into_iter()
    .filter(|segment| !segment.is_empty())
    .collect::<Vec<_>>()
    .join(":")
}

#[derive(Debug, Clone)]
pub struct DevelopmentEnvironmentBuilder {
  name: String,
  artifacts: Vec<String>,
  environments: Vec<String>,
  secrets: Vec<ArtifactStepSecret>,
  systems: Vec<ArtifactSystem>,
}

impl DevelopmentEnvironmentBuilder {
  pub fn new(name: &str, systems: Vec<ArtifactSystem>) -> Self {
    Self {
      name: name.to_string(),
      artifacts: vec![],
      environments: vec![],
      secrets: vec![],
      systems,
    }
  }

  pub fn with_artifacts(mut self, artifacts: Vec<String>) -> Self {
    self.artifacts = artifacts;
    self
  }

  pub fn with_environments(mut self, environments: Vec<String>) -> Self {
    self.environments = environments;
    self
  }

  pub fn with_secrets(mut self, secrets: Vec<ArtifactStepSecret>) -> Self {
    self.secrets = secrets;
    self
  }

  pub fn script(&self) -> String {
    let (variables, paths) = split_environments(&self.environments);
    let path = activation_path(None, &self.artifacts, &paths);

    let mut activate = vec![
      "# source this file: . bin/activate".to_string(),
      String::new(),
      format!("export {}PATH=\"\\$PATH\"", BACKUP_PREFIX),
    ];
    for (key, _) in &variables {
      activate.push(format!("export {prefix}{key}=\"\\${{{key}:-}}\"", prefix = BACKUP_PREFIX, key = key));
    }
    activate.push(String::new());
    for (key, value) in &variables {
      activate.push(format!("export {}=\"{}\"", key, value));
    }
    activate.push(format!("export PATH=\"{}\"", path));

    let mut deactivate = vec![
      "# source this file: . bin/deactivate".to_string(),
      String::new(),
      format!("export PATH=\"\\${}PATH\"", BACKUP_PREFIX),
      format!("unset {}PATH", BACKUP_PREFIX),
    ];
    for (key, _) in &variables {
      deactivate.push(format!("export {key}=\"\\${prefix}{key}\"", prefix = BACKUP_PREFIX, key = key));
      deactivate.push(format!("unset {}{}", BACKUP_PREFIX, key));
    }

    [
      "mkdir -pv $VORPAL_OUTPUT/bin".to_string(),
      write_bin("activate", &activate.join("\n")),
      write_bin("deactivate", &deactivate.join("\n")),
    ]
    .join("\n")
  }

  pub async fn build(self, context: &ConfigContext) -> Result<String, ContextError> {
    let script = self.script();
    let step = step::shell(context, self.artifacts.clone(), vec![], &script, self.secrets).await?;

    ArtifactBuilder::new(&self.name, vec![step], self.systems).build(context).await
  }
}

/// A user profile with managed symlinks.
///
/// Symlink sources expand while the step runs, so they may name dependency
/// tokens. Targets expand when the symlink scripts run, so `$HOME` refers to
/// the activating user.
#[derive(Debug, Clone)]
pub struct UserEnvironmentBuilder {
  name: String,
  artifacts: Vec<String>,
  environments: Vec<String>,
  symlinks: Vec<(String, String)>,
  systems: Vec<ArtifactSystem>,
}

impl UserEnvironmentBuilder {
  pub fn new(name: &str, systems: Vec<ArtifactSystem>) -> Self {
    Self {
      name: name.to_string(),
      artifacts: vec![],
      environments: vec![],
      symlinks: vec![],
      systems,
    }
  }

  pub fn with_artifacts(mut self, artifacts: Vec<String>) -> Self {
    self.artifacts = artifacts;
    self
  }

  pub fn with_environments(mut self, environments: Vec<String>) -> Self {
    self.environments = environments;
    self
  }

  /// `(source, target)` pairs.
  pub fn with_symlinks(mut self, symlinks: Vec<(String, String)>) -> Self {
    self.symlinks = symlinks;
    self
  }

  pub fn script(&self) -> String {
    let (variables, paths) = split_environments(&self.environments);
    let path = activation_path(Some("$VORPAL_OUTPUT/bin"), &self.artifacts, &paths);

    let mut activate = vec!["#!/bin/bash".to_string(), String::new()];
    for (key, value) in &variables {
      activate.push(format!("export {}=\"{}\"", key, value));
    }
    activate.push(format!("export PATH=\"{}\"", path));
    activate.push(String::new());
    activate.push("exec \"\\$@\"".to_string());

    let mut activate_symlinks = vec!["#!/bin/bash".to_string(), "set -euo pipefail".to_string(), String::new()];
    let mut deactivate_symlinks = activate_symlinks.clone();

    for (source, target) in &self.symlinks {
      let target = target.replace('$', "\\$");
      activate_symlinks.push(format!("mkdir -p \"\\$(dirname \"{}\")\"", target));
      activate_symlinks.push(format!("ln -sfv \"{}\" \"{}\"", source, target));
      deactivate_symlinks.push(format!("rm -fv \"{}\"", target));
    }

    [
      "mkdir -pv $VORPAL_OUTPUT/bin".to_string(),
      write_bin("vorpal-activate", &activate.join("\n")),
      write_bin("vorpal-activate-symlinks", &activate_symlinks.join("\n")),
      write_bin("vorpal-deactivate-symlinks", &deactivate_symlinks.join("\n")),
    ]
    .join("\n")
  }

  pub async fn build(self, context: &ConfigContext) -> Result<String, ContextError> {
    let script = self.script();
    let step = step::shell(context, self.artifacts.clone(), vec![], &script, vec![]).await?;

    ArtifactBuilder::new(&self.name, vec![step], self.systems).build(context).await
  }
}

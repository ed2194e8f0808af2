use std::fmt;

use serde::{Deserialize, Serialize};

use crate::consts::ARTIFACT_ENV_PREFIX;
use crate::system::ArtifactSystem;

/// A declared input tree.
///
/// `digest` is mandatory for remote sources and, once set, authoritative:
/// resolution fails if the computed hash differs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ArtifactSource {
  pub name: String,
  pub path: String,
  pub digest: Option<String>,
  pub includes: Vec<String>,
  pub excludes: Vec<String>,
}

/// A secret injected into a step's environment at execution time.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactStepSecret {
  pub name: String,
  pub value: String,
}

impl fmt::Debug for ArtifactStepSecret {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ArtifactStepSecret")
      .field("name", &self.name)
      .field("value", &"<redacted>")
      .finish()
  }
}

/// One executable build unit, materialized for a single system.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ArtifactStep {
  pub entrypoint: Option<String>,
  pub script: Option<String>,
  pub arguments: Vec<String>,
  /// Digests of artifacts this step depends on.
  pub artifacts: Vec<String>,
  /// `KEY=VALUE` entries.
  pub environments: Vec<String>,
  pub secrets: Vec<ArtifactStepSecret>,
}

/// The unit of content addressing.
///
/// Field order is part of the canonical encoding; see [`super::digest`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Artifact {
  pub target: ArtifactSystem,
  pub name: String,
  pub sources: Vec<ArtifactSource>,
  pub steps: Vec<ArtifactStep>,
  pub systems: Vec<ArtifactSystem>,
  pub aliases: Vec<String>,
}

impl Artifact {
  /// Every dependency digest referenced by any step, in first-seen order.
  pub fn dependencies(&self) -> Vec<&str> {
    let mut deps: Vec<&str> = Vec::new();
    for step in &self.steps {
      for digest in &step.artifacts {
        if !deps.contains(&digest.as_str()) {
          deps.push(digest);
        }
      }
    }
    deps
  }
}

/// Returns the indirection token for a dependency, e.g. `$VORPAL_ARTIFACT_<digest>`.
///
/// The worker resolves the token to the materialized path at execution time.
pub fn get_env_key(digest: &str) -> String {
  format!("${}{}", ARTIFACT_ENV_PREFIX, digest)
}

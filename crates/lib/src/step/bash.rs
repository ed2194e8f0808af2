use crate::artifact::{ArtifactStep, ArtifactStepSecret};

use super::{step_environment, strict_script};

/// Unconfined bash step, used for Darwin targets.
///
/// The script runs in strict mode. Environment entries pass through
/// unchanged except PATH, which is assembled from the declared value, each
/// dependency's `bin/` and the default system PATH.
pub fn bash(
  artifacts: Vec<String>,
  environments: Vec<String>,
  script: &str,
  secrets: Vec<ArtifactStepSecret>,
) -> ArtifactStep {
  let env = step_environment(&artifacts, &environments);

  let mut step_environments: Vec<String> = env
    .variables
    .into_iter()
    .map(|(key, value)| format!("{}={}", key, value))
    .collect();
  step_environments.push(format!("PATH={}", env.path));

  ArtifactStep {
    entrypoint: Some("bash".to_string()),
    script: Some(strict_script(script)),
    arguments: vec![],
    artifacts,
    environments: step_environments,
    secrets,
  }
}

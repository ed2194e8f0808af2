use crate::artifact::ArtifactStep;

/// Step that shells out to `docker` with the caller's arguments.
pub fn docker(arguments: Vec<String>, artifacts: Vec<String>) -> ArtifactStep {
  ArtifactStep {
    entrypoint: Some("docker".to_string()),
    script: None,
    arguments,
    artifacts,
    environments: vec!["PATH=/usr/bin:/usr/local/bin".to_string()],
    secrets: vec![],
  }
}

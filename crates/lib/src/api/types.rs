//! Request and response values exchanged with the agent and registry, in
//! SDK terms. [`super::proto`] holds their wire form.

use crate::artifact::Artifact;
use crate::system::ArtifactSystem;

#[derive(Debug, Clone, PartialEq)]
pub struct PrepareArtifactRequest {
  pub artifact: Artifact,
  pub system: ArtifactSystem,
}

/// One progress message of a prepare stream.
///
/// Each field is optional; the last `artifact` and `artifact_digest`
/// observed before the stream closes are authoritative.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PrepareArtifactResponse {
  pub artifact_output: Option<String>,
  pub artifact: Option<Artifact>,
  pub artifact_digest: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveExistsRequest {
  pub digest: String,
  pub kind: String,
  pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactAliasRequest {
  pub alias: String,
  pub system: ArtifactSystem,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigArtifact {
  pub digest: String,
  pub artifact: Artifact,
}

/// The full built graph, dependencies before dependents.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigResponse {
  pub artifacts: Vec<ConfigArtifact>,
}

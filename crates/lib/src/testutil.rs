//! In-memory agent and registry used by unit tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::{StreamExt, stream};

use crate::api::{
  AgentService, ApiError, ArchiveExistsRequest, ArtifactAliasRequest, PrepareArtifactRequest,
  PrepareArtifactResponse, PrepareStream, RegistryService,
};
use crate::artifact::{Artifact, ArtifactStep};
use crate::context::ConfigContext;
use crate::system::ArtifactSystem;

/// Agent that accepts every artifact and reports its local digest.
///
/// Set `rewrite` to have the agent replace the artifact's name before
/// finalizing, which changes the authoritative digest.
#[derive(Default)]
pub struct FakeAgent {
  pub requests: Mutex<Vec<PrepareArtifactRequest>>,
  pub rewrite: Option<String>,
  pub omit_digest: bool,
}

impl FakeAgent {
  pub fn calls(&self) -> usize {
    self.requests.lock().unwrap().len()
  }
}

#[async_trait]
impl AgentService for FakeAgent {
  async fn prepare_artifact(&self, request: PrepareArtifactRequest) -> Result<PrepareStream, ApiError> {
    self.requests.lock().unwrap().push(request.clone());

    let mut artifact = request.artifact.clone();
    let mut messages = vec![PrepareArtifactResponse {
      artifact_output: Some(format!("preparing {}", artifact.name)),
      ..Default::default()
    }];

    if let Some(name) = &self.rewrite {
      artifact.name = name.clone();
      messages.push(PrepareArtifactResponse {
        artifact: Some(artifact.clone()),
        ..Default::default()
      });
    }

    if !self.omit_digest {
      let digest = artifact
        .digest(request.system)
        .map_err(|e| ApiError::Decode(e.to_string()))?;
      messages.push(PrepareArtifactResponse {
        artifact_output: Some("done".to_string()),
        artifact_digest: Some(digest),
        ..Default::default()
      });
    }

    Ok(stream::iter(messages.into_iter().map(Ok)).boxed())
  }
}

#[derive(Default)]
pub struct FakeRegistry {
  pub artifacts: Mutex<BTreeMap<String, Artifact>>,
  pub aliases: Mutex<HashMap<(String, ArtifactSystem), String>>,
  pub archives: Mutex<Vec<String>>,
  pub fetched: Mutex<Vec<String>>,
  pub alias_lookups: Mutex<Vec<ArtifactAliasRequest>>,
  pub exists_calls: Mutex<Vec<ArchiveExistsRequest>>,
}

impl FakeRegistry {
  /// Store `artifact` under its digest for `system` and return the digest.
  pub fn insert(&self, artifact: Artifact, system: ArtifactSystem) -> String {
    let digest = artifact.digest(system).unwrap();
    self.artifacts.lock().unwrap().insert(digest.clone(), artifact);
    digest
  }

  pub fn insert_alias(&self, alias: &str, system: ArtifactSystem, digest: &str) {
    self
      .aliases
      .lock()
      .unwrap()
      .insert((alias.to_string(), system), digest.to_string());
  }

  pub fn fetch_count(&self, digest: &str) -> usize {
    self.fetched.lock().unwrap().iter().filter(|d| *d == digest).count()
  }
}

#[async_trait]
impl RegistryService for FakeRegistry {
  async fn get_artifact(&self, digest: &str) -> Result<Artifact, ApiError> {
    self.fetched.lock().unwrap().push(digest.to_string());
    self
      .artifacts
      .lock()
      .unwrap()
      .get(digest)
      .cloned()
      .ok_or_else(|| ApiError::NotFound(digest.to_string()))
  }

  async fn get_artifacts(&self) -> Result<Vec<String>, ApiError> {
    Ok(self.artifacts.lock().unwrap().keys().cloned().collect())
  }

  async fn exists(&self, request: ArchiveExistsRequest) -> Result<bool, ApiError> {
    let exists = self.archives.lock().unwrap().contains(&request.digest);
    self.exists_calls.lock().unwrap().push(request);
    Ok(exists)
  }

  async fn get_artifact_alias(&self, request: ArtifactAliasRequest) -> Result<String, ApiError> {
    self.alias_lookups.lock().unwrap().push(request.clone());
    self
      .aliases
      .lock()
      .unwrap()
      .get(&(request.alias.clone(), request.system))
      .cloned()
      .ok_or(ApiError::NotFound(request.alias))
  }
}

pub fn test_context(system: ArtifactSystem) -> (ConfigContext, Arc<FakeAgent>, Arc<FakeRegistry>) {
  context_with(system, FakeAgent::default())
}

pub fn context_with(system: ArtifactSystem, agent: FakeAgent) -> (ConfigContext, Arc<FakeAgent>, Arc<FakeRegistry>) {
  let agent = Arc::new(agent);
  let registry = Arc::new(FakeRegistry::default());
  let context = ConfigContext::new("test", system, agent.clone(), registry.clone());
  (context, agent, registry)
}

/// A leaf artifact with a single script step.
pub fn leaf(name: &str, deps: &[&str]) -> Artifact {
  Artifact {
    target: ArtifactSystem::X8664Linux,
    name: name.to_string(),
    sources: vec![],
    steps: vec![ArtifactStep {
      entrypoint: Some("bash".to_string()),
      script: Some(format!("echo {}", name)),
      artifacts: deps.iter().map(|d| d.to_string()).collect(),
      ..Default::default()
    }],
    systems: vec![ArtifactSystem::X8664Linux],
    aliases: vec![],
  }
}

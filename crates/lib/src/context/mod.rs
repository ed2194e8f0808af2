//! The configuration context.
//!
//! A [`ConfigContext`] is the hub an artifact-definition program talks to.
//! It owns the local digest-to-artifact map, submits new artifacts to the
//! agent, pulls existing graphs from the registry and finally serves the
//! collected graph to the orchestrating CLI with [`ConfigContext::run`].
//!
//! The map is append-only. An entry is written once, by whichever caller
//! gets there first, and never replaced.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use futures_util::StreamExt;
use thiserror::Error;
use tracing::{debug, info};

use crate::api::{AgentService, ApiError, ArtifactAliasRequest, PrepareArtifactRequest, RegistryService};
use crate::artifact::alias::{AliasError, ArtifactAlias};
use crate::artifact::{Artifact, ArtifactSource};
use crate::consts::DEFAULT_PORT;
use crate::paths::source_cache_dir;
use crate::server::{self, GraphState};
use crate::source::{ResolvedSource, SourceError, SourceResolver};
use crate::system::ArtifactSystem;

#[derive(Debug, Error)]
pub enum ContextError {
  #[error(transparent)]
  Api(#[from] ApiError),

  #[error(transparent)]
  Source(#[from] SourceError),

  #[error(transparent)]
  Alias(#[from] AliasError),

  #[error("failed to encode artifact: {0}")]
  Digest(#[from] serde_json::Error),

  #[error("artifact '{0}' has no steps")]
  EmptySteps(String),

  #[error("artifact name is empty")]
  EmptyName,

  #[error("unsupported system: {0}")]
  UnsupportedSystem(ArtifactSystem),

  #[error("missing required variable: {0}")]
  MissingVariable(String),

  #[error("invalid variable '{0}', expected key=value")]
  InvalidVariable(String),

  #[error("agent returned no digest for artifact '{0}'")]
  MissingDigest(String),

  #[error("artifact graph contains a cycle at {0}")]
  CycleDetected(String),

  #[error("server error: {0}")]
  Server(#[from] std::io::Error),
}

#[derive(Debug, Default)]
struct ContextStore {
  /// Authoritative digest to artifact.
  artifacts: BTreeMap<String, Artifact>,
  /// Locally computed digest to the digest the agent finalized.
  submitted: HashMap<String, String>,
  /// Resolved aliases per system.
  aliases: HashMap<(String, ArtifactSystem), String>,
}

pub struct ConfigContext {
  artifact: String,
  system: ArtifactSystem,
  port: u16,
  variables: BTreeMap<String, String>,
  source_cache_dir: PathBuf,
  agent: Arc<dyn AgentService>,
  registry: Arc<dyn RegistryService>,
  store: Mutex<ContextStore>,
}

impl ConfigContext {
  pub fn new(
    artifact: impl Into<String>,
    system: ArtifactSystem,
    agent: Arc<dyn AgentService>,
    registry: Arc<dyn RegistryService>,
  ) -> Self {
    Self {
      artifact: artifact.into(),
      system,
      port: DEFAULT_PORT,
      variables: BTreeMap::new(),
      source_cache_dir: source_cache_dir(),
      agent,
      registry,
      store: Mutex::new(ContextStore::default()),
    }
  }

  pub fn with_port(mut self, port: u16) -> Self {
    self.port = port;
    self
  }

  pub fn with_variables(mut self, variables: BTreeMap<String, String>) -> Self {
    self.variables = variables;
    self
  }

  pub fn with_source_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.source_cache_dir = dir.into();
    self
  }

  // Never held across an await point.
  fn store(&self) -> MutexGuard<'_, ContextStore> {
    self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  fn insert(&self, digest: &str, artifact: Artifact) {
    self.store().artifacts.entry(digest.to_string()).or_insert(artifact);
  }

  /// Submit an artifact to the agent and return its authoritative digest.
  ///
  /// Artifacts already known locally, under their own digest or under the
  /// digest they were submitted with, are returned without a network call.
  pub async fn add_artifact(&self, artifact: &Artifact) -> Result<String, ContextError> {
    if artifact.steps.is_empty() {
      return Err(ContextError::EmptySteps(artifact.name.clone()));
    }

    let local_digest = artifact.digest(self.system)?;

    {
      let store = self.store();
      if store.artifacts.contains_key(&local_digest) {
        debug!(name = %artifact.name, digest = %local_digest, "artifact already known");
        return Ok(local_digest);
      }
      if let Some(digest) = store.submitted.get(&local_digest) {
        debug!(name = %artifact.name, digest = %digest, "artifact already submitted");
        return Ok(digest.clone());
      }
    }

    let mut request_artifact = artifact.clone();
    request_artifact.target = self.system;

    info!(name = %artifact.name, digest = %local_digest, system = %self.system, "preparing artifact");

    let mut stream = self
      .agent
      .prepare_artifact(PrepareArtifactRequest {
        artifact: request_artifact.clone(),
        system: self.system,
      })
      .await?;

    let mut final_artifact = request_artifact;
    let mut final_digest = None;

    while let Some(message) = stream.next().await {
      let message = message?;

      if let Some(output) = message.artifact_output {
        info!(name = %artifact.name, "{}", output);
      }
      if let Some(prepared) = message.artifact {
        final_artifact = prepared;
      }
      if let Some(digest) = message.artifact_digest {
        final_digest = Some(digest);
      }
    }

    let digest = final_digest.ok_or_else(|| ContextError::MissingDigest(artifact.name.clone()))?;

    if digest != local_digest {
      debug!(name = %artifact.name, local = %local_digest, digest = %digest, "agent rewrote artifact");
    }

    {
      let mut store = self.store();
      store.artifacts.entry(digest.clone()).or_insert(final_artifact);
      store.submitted.entry(local_digest).or_insert(digest.clone());
    }

    Ok(digest)
  }

  /// Pull an artifact and its whole dependency closure from the registry.
  pub async fn fetch_artifact(&self, digest: &str) -> Result<String, ContextError> {
    if self.store().artifacts.contains_key(digest) {
      return Ok(digest.to_string());
    }

    let mut visited = HashSet::new();
    let mut pending = vec![digest.to_string()];

    while let Some(current) = pending.pop() {
      if !visited.insert(current.clone()) {
        continue;
      }

      let known = self.get_artifact(&current);
      let artifact = match known {
        Some(artifact) => artifact,
        None => {
          debug!(digest = %current, "fetching artifact");
          let artifact = self.registry.get_artifact(&current).await?;
          self.insert(&current, artifact.clone());
          artifact
        }
      };

      for dependency in artifact.dependencies().into_iter().rev() {
        if !visited.contains(dependency) {
          pending.push(dependency.to_string());
        }
      }
    }

    Ok(digest.to_string())
  }

  /// Resolve an alias for the active system and fetch what it points to.
  pub async fn fetch_artifact_alias(&self, alias: &str) -> Result<String, ContextError> {
    let alias = alias.parse::<ArtifactAlias>()?.to_string();
    let key = (alias.clone(), self.system);

    let cached = self.store().aliases.get(&key).cloned();
    let digest = match cached {
      Some(digest) => digest,
      None => {
        let digest = self
          .registry
          .get_artifact_alias(ArtifactAliasRequest {
            alias: alias.clone(),
            system: self.system,
          })
          .await?;
        debug!(alias = %alias, digest = %digest, "resolved alias");
        self.store().aliases.entry(key).or_insert(digest).clone()
      }
    };

    self.fetch_artifact(&digest).await
  }

  pub async fn resolve_source(&self, source: &ArtifactSource) -> Result<ResolvedSource, ContextError> {
    let resolver = SourceResolver::new(self.source_cache_dir.clone()).with_registry(self.registry.clone());
    Ok(resolver.resolve(source).await?)
  }

  pub fn get_variable(&self, name: &str) -> Option<String> {
    self.variables.get(name).cloned()
  }

  pub fn get_artifact(&self, digest: &str) -> Option<Artifact> {
    self.store().artifacts.get(digest).cloned()
  }

  /// Snapshot of every artifact known to this context.
  pub fn get_artifact_store(&self) -> BTreeMap<String, Artifact> {
    self.store().artifacts.clone()
  }

  pub fn get_artifact_name(&self) -> &str {
    &self.artifact
  }

  pub fn get_system(&self) -> ArtifactSystem {
    self.system
  }

  pub fn get_port(&self) -> u16 {
    self.port
  }

  /// Serve the collected graph on `127.0.0.1:<port>` until interrupted.
  pub async fn run(&self) -> Result<(), ContextError> {
    let state = GraphState::new(self.get_artifact_store())?;
    let address = SocketAddr::from(([127, 0, 0, 1], self.port));
    let listener = tokio::net::TcpListener::bind(address).await?;

    info!(
      address = %address,
      artifact = %self.artifact,
      artifacts = state.len(),
      "serving artifact graph"
    );

    server::serve(listener, state, async {
      let _ = tokio::signal::ctrl_c().await;
    })
    .await?;

    Ok(())
  }
}

//! Read-only graph server.
//!
//! Once an artifact-definition program has declared its graph, the
//! orchestrating CLI reads it back through the `ArtifactService` gRPC
//! interface. `GetArtifact`, `GetArtifacts` and `GetConfig` are answered from
//! a snapshot; `GetConfig` lists dependencies first. `StoreArtifact` and
//! `GetArtifactAlias` are unimplemented. Secret values never leave the
//! process.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tonic::{Request, Response, Status};
use tracing::debug;

use crate::api::proto::artifact as wire;
use crate::api::proto::artifact::artifact_service_server::{ArtifactService, ArtifactServiceServer};
use crate::api::{ApiError, ConfigArtifact, ConfigResponse};
use crate::artifact::Artifact;
use crate::context::ContextError;

const REDACTED: &str = "<redacted>";

/// An immutable snapshot of the artifact map plus its topological order.
#[derive(Debug, Clone)]
pub struct GraphState {
  artifacts: BTreeMap<String, Artifact>,
  order: Vec<String>,
}

impl GraphState {
  /// Order the graph so every dependency precedes its dependents.
  ///
  /// Dependencies that are not part of the map are ignored.
  pub fn new(artifacts: BTreeMap<String, Artifact>) -> Result<Self, ContextError> {
    let mut graph = DiGraph::<String, ()>::new();
    let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();

    for digest in artifacts.keys() {
      nodes.insert(digest, graph.add_node(digest.clone()));
    }

    for (digest, artifact) in &artifacts {
      let dependent = nodes[digest.as_str()];
      for dependency in artifact.dependencies() {
        if let Some(&index) = nodes.get(dependency) {
          graph.add_edge(index, dependent, ());
        }
      }
    }

    let sorted = toposort(&graph, None).map_err(|cycle| ContextError::CycleDetected(graph[cycle.node_id()].clone()))?;
    let order = sorted.into_iter().map(|index| graph[index].clone()).collect();

    Ok(Self { artifacts, order })
  }

  pub fn len(&self) -> usize {
    self.artifacts.len()
  }

  pub fn is_empty(&self) -> bool {
    self.artifacts.is_empty()
  }

  pub fn get(&self, digest: &str) -> Option<&Artifact> {
    self.artifacts.get(digest)
  }

  /// Digests in dependency-first order.
  pub fn order(&self) -> &[String] {
    &self.order
  }

  pub fn config(&self) -> ConfigResponse {
    ConfigResponse {
      artifacts: self
        .order
        .iter()
        .filter_map(|digest| {
          self.artifacts.get(digest).map(|artifact| ConfigArtifact {
            digest: digest.clone(),
            artifact: artifact.clone(),
          })
        })
        .collect(),
    }
  }
}

/// Copy of `artifact` with every secret value replaced.
fn redact(artifact: &Artifact) -> Artifact {
  let mut artifact = artifact.clone();
  for secret in artifact.steps.iter_mut().flat_map(|step| step.secrets.iter_mut()) {
    secret.value = REDACTED.to_string();
  }
  artifact
}

/// `ArtifactService` implementation over a [`GraphState`].
#[derive(Debug, Clone)]
pub struct GraphService {
  state: Arc<GraphState>,
}

impl GraphService {
  pub fn new(state: GraphState) -> Self {
    Self { state: Arc::new(state) }
  }
}

#[tonic::async_trait]
impl ArtifactService for GraphService {
  async fn get_artifact(&self, request: Request<wire::ArtifactRequest>) -> Result<Response<wire::Artifact>, Status> {
    let digest = request.into_inner().digest;
    debug!(digest = %digest, "get artifact");

    match self.state.get(&digest) {
      Some(artifact) => Ok(Response::new(redact(artifact).into())),
      None => Err(Status::not_found(digest)),
    }
  }

  async fn get_artifact_alias(
    &self,
    _request: Request<wire::GetArtifactAliasRequest>,
  ) -> Result<Response<wire::GetArtifactAliasResponse>, Status> {
    Err(Status::unimplemented("aliases are resolved by the registry"))
  }

  async fn get_artifacts(
    &self,
    _request: Request<wire::ArtifactsRequest>,
  ) -> Result<Response<wire::ArtifactsResponse>, Status> {
    Ok(Response::new(wire::ArtifactsResponse {
      digests: self.state.artifacts.keys().cloned().collect(),
    }))
  }

  async fn get_config(&self, _request: Request<wire::ConfigRequest>) -> Result<Response<wire::ConfigResponse>, Status> {
    let mut config = self.state.config();
    for entry in &mut config.artifacts {
      entry.artifact = redact(&entry.artifact);
    }
    Ok(Response::new(config.into()))
  }

  async fn store_artifact(&self, _request: Request<wire::Artifact>) -> Result<Response<wire::ArtifactResponse>, Status> {
    Err(Status::unimplemented("artifacts cannot be stored through the config server"))
  }
}

/// Serve `state` on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: GraphState, shutdown: F) -> Result<(), ApiError>
where
  F: Future<Output = ()> + Send,
{
  Server::builder()
    .add_service(ArtifactServiceServer::new(GraphService::new(state)))
    .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
    .await?;

  Ok(())
}

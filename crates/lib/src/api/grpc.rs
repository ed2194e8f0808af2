//! tonic clients for the agent and registry.
//!
//! Channels are opened on first use, so constructing a client never needs a
//! runtime and never touches the network.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::OnceCell;
use tonic::transport::{Channel, Endpoint};
use tracing::debug;

use crate::artifact::Artifact;

use super::proto::agent::agent_service_client::AgentServiceClient;
use super::proto::archive::ArchiveCheckRequest;
use super::proto::archive::archive_service_client::ArchiveServiceClient;
use super::proto::artifact::artifact_service_client::ArtifactServiceClient;
use super::proto::artifact::{ArtifactRequest, ArtifactsRequest, GetArtifactAliasRequest};
use super::proto::agent;
use super::{
  AgentService, ApiError, ArchiveExistsRequest, ArtifactAliasRequest, PrepareArtifactRequest,
  PrepareArtifactResponse, PrepareStream, RegistryService, system_to_proto,
};

#[derive(Debug, Clone)]
struct LazyChannel {
  endpoint: Endpoint,
  channel: Arc<OnceCell<Channel>>,
}

impl LazyChannel {
  fn new(url: &str) -> Result<Self, ApiError> {
    let endpoint =
      Endpoint::from_shared(url.to_string()).map_err(|_| ApiError::InvalidEndpoint(url.to_string()))?;

    Ok(Self {
      endpoint,
      channel: Arc::new(OnceCell::new()),
    })
  }

  async fn get(&self) -> Result<Channel, ApiError> {
    let channel = self
      .channel
      .get_or_try_init(|| async {
        debug!(uri = %self.endpoint.uri(), "connecting");
        self.endpoint.connect().await
      })
      .await?;

    Ok(channel.clone())
  }
}

#[derive(Debug, Clone)]
pub struct GrpcAgentClient {
  channel: LazyChannel,
}

impl GrpcAgentClient {
  pub fn new(url: &str) -> Result<Self, ApiError> {
    Ok(Self {
      channel: LazyChannel::new(url)?,
    })
  }
}

#[async_trait]
impl AgentService for GrpcAgentClient {
  async fn prepare_artifact(&self, request: PrepareArtifactRequest) -> Result<PrepareStream, ApiError> {
    debug!(name = %request.artifact.name, system = %request.system, "preparing artifact");

    let mut client = AgentServiceClient::new(self.channel.get().await?);
    let stream = client
      .prepare_artifact(agent::PrepareArtifactRequest::from(request))
      .await?
      .into_inner();

    Ok(
      stream
        .map(|message| message.map_err(ApiError::from).and_then(PrepareArtifactResponse::try_from))
        .boxed(),
    )
  }
}

#[derive(Debug, Clone)]
pub struct GrpcRegistryClient {
  channel: LazyChannel,
}

impl GrpcRegistryClient {
  pub fn new(url: &str) -> Result<Self, ApiError> {
    Ok(Self {
      channel: LazyChannel::new(url)?,
    })
  }
}

#[async_trait]
impl RegistryService for GrpcRegistryClient {
  async fn get_artifact(&self, digest: &str) -> Result<Artifact, ApiError> {
    let mut client = ArtifactServiceClient::new(self.channel.get().await?);
    let request = ArtifactRequest {
      digest: digest.to_string(),
    };

    match client.get_artifact(request).await {
      Ok(response) => Artifact::try_from(response.into_inner()),
      Err(status) if status.code() == tonic::Code::NotFound => Err(ApiError::NotFound(digest.to_string())),
      Err(status) => Err(status.into()),
    }
  }

  async fn get_artifacts(&self) -> Result<Vec<String>, ApiError> {
    let mut client = ArtifactServiceClient::new(self.channel.get().await?);
    let response = client.get_artifacts(ArtifactsRequest {}).await?;
    Ok(response.into_inner().digests)
  }

  async fn exists(&self, request: ArchiveExistsRequest) -> Result<bool, ApiError> {
    let mut client = ArchiveServiceClient::new(self.channel.get().await?);
    let response = client
      .check(ArchiveCheckRequest {
        digest: request.digest,
        kind: request.kind,
        name: request.name,
      })
      .await?;
    Ok(response.into_inner().exists)
  }

  async fn get_artifact_alias(&self, request: ArtifactAliasRequest) -> Result<String, ApiError> {
    let mut client = ArtifactServiceClient::new(self.channel.get().await?);
    let response = client
      .get_artifact_alias(GetArtifactAliasRequest {
        alias: request.alias,
        system: system_to_proto(request.system),
      })
      .await?;
    Ok(response.into_inner().digest)
  }
}

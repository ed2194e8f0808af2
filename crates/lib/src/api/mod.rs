//! Agent and registry collaborators.
//!
//! The SDK only ever talks to these services through the [`AgentService`]
//! and [`RegistryService`] traits. [`grpc`] provides the tonic clients used
//! at runtime; tests substitute in-memory implementations. [`proto`] holds
//! the generated wire types and service stubs shared with the other SDKs.

mod convert;
pub mod grpc;
mod types;

pub use convert::{system_from_proto, system_to_proto};
pub use types::*;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use thiserror::Error;

use crate::artifact::Artifact;

pub mod proto {
  pub mod agent {
    tonic::include_proto!("vorpal.agent");
  }

  pub mod archive {
    tonic::include_proto!("vorpal.archive");
  }

  pub mod artifact {
    tonic::include_proto!("vorpal.artifact");
  }
}

/// Errors from agent or registry calls. All of them are fatal at this layer.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("transport error: {0}")]
  Transport(#[from] tonic::transport::Error),

  #[error("invalid endpoint '{0}'")]
  InvalidEndpoint(String),

  #[error("rpc failed ({code}): {message}")]
  Status { code: tonic::Code, message: String },

  #[error("not found: {0}")]
  NotFound(String),

  #[error("invalid message: {0}")]
  Decode(String),

  #[error("not implemented: {0}")]
  Unimplemented(String),
}

impl From<tonic::Status> for ApiError {
  fn from(status: tonic::Status) -> Self {
    let message = status.message().to_string();
    match status.code() {
      tonic::Code::NotFound => ApiError::NotFound(message),
      tonic::Code::Unimplemented => ApiError::Unimplemented(message),
      code => ApiError::Status { code, message },
    }
  }
}

/// Progress messages of a prepare call, in arrival order.
pub type PrepareStream = BoxStream<'static, Result<PrepareArtifactResponse, ApiError>>;

/// The service that accepts artifact submissions.
#[async_trait]
pub trait AgentService: Send + Sync {
  /// Submit an artifact. The returned stream ends when the agent closes it.
  async fn prepare_artifact(&self, request: PrepareArtifactRequest) -> Result<PrepareStream, ApiError>;
}

/// The service that stores built artifacts and source archives.
#[async_trait]
pub trait RegistryService: Send + Sync {
  async fn get_artifact(&self, digest: &str) -> Result<Artifact, ApiError>;

  async fn get_artifacts(&self) -> Result<Vec<String>, ApiError>;

  /// Whether an archive of `kind` is already stored under `digest`.
  async fn exists(&self, request: ArchiveExistsRequest) -> Result<bool, ApiError>;

  /// Resolve a `[namespace/]name:tag` alias to a digest for a system.
  async fn get_artifact_alias(&self, request: ArtifactAliasRequest) -> Result<String, ApiError>;
}

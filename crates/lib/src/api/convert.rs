//! Conversions between SDK values and their protobuf wire form.
//!
//! Decoding is fallible: enum values outside the known set and missing
//! required messages are rejected as [`ApiError::Decode`].

use crate::artifact::{Artifact, ArtifactSource, ArtifactStep, ArtifactStepSecret};
use crate::system::ArtifactSystem;

use super::proto::{agent, artifact as wire};
use super::{ApiError, ConfigArtifact, ConfigResponse, PrepareArtifactRequest, PrepareArtifactResponse};

pub fn system_to_proto(system: ArtifactSystem) -> i32 {
  let system = match system {
    ArtifactSystem::Unknown => wire::ArtifactSystem::UnknownSystem,
    ArtifactSystem::Aarch64Darwin => wire::ArtifactSystem::Aarch64Darwin,
    ArtifactSystem::Aarch64Linux => wire::ArtifactSystem::Aarch64Linux,
    ArtifactSystem::X8664Darwin => wire::ArtifactSystem::X8664Darwin,
    ArtifactSystem::X8664Linux => wire::ArtifactSystem::X8664Linux,
  };
  system as i32
}

pub fn system_from_proto(value: i32) -> Result<ArtifactSystem, ApiError> {
  match wire::ArtifactSystem::try_from(value) {
    Ok(wire::ArtifactSystem::UnknownSystem) => Ok(ArtifactSystem::Unknown),
    Ok(wire::ArtifactSystem::Aarch64Darwin) => Ok(ArtifactSystem::Aarch64Darwin),
    Ok(wire::ArtifactSystem::Aarch64Linux) => Ok(ArtifactSystem::Aarch64Linux),
    Ok(wire::ArtifactSystem::X8664Darwin) => Ok(ArtifactSystem::X8664Darwin),
    Ok(wire::ArtifactSystem::X8664Linux) => Ok(ArtifactSystem::X8664Linux),
    Err(_) => Err(ApiError::Decode(format!("unknown system value {}", value))),
  }
}

fn required<T>(value: Option<T>, what: &str) -> Result<T, ApiError> {
  value.ok_or_else(|| ApiError::Decode(format!("missing {}", what)))
}

impl From<ArtifactSource> for wire::ArtifactSource {
  fn from(source: ArtifactSource) -> Self {
    Self {
      name: source.name,
      path: source.path,
      digest: source.digest,
      includes: source.includes,
      excludes: source.excludes,
    }
  }
}

impl From<wire::ArtifactSource> for ArtifactSource {
  fn from(source: wire::ArtifactSource) -> Self {
    Self {
      name: source.name,
      path: source.path,
      digest: source.digest,
      includes: source.includes,
      excludes: source.excludes,
    }
  }
}

impl From<ArtifactStep> for wire::ArtifactStep {
  fn from(step: ArtifactStep) -> Self {
    Self {
      entrypoint: step.entrypoint,
      script: step.script,
      arguments: step.arguments,
      artifacts: step.artifacts,
      environments: step.environments,
      secrets: step
        .secrets
        .into_iter()
        .map(|secret| wire::ArtifactStepSecret {
          name: secret.name,
          value: secret.value,
        })
        .collect(),
    }
  }
}

impl From<wire::ArtifactStep> for ArtifactStep {
  fn from(step: wire::ArtifactStep) -> Self {
    Self {
      entrypoint: step.entrypoint,
      script: step.script,
      arguments: step.arguments,
      artifacts: step.artifacts,
      environments: step.environments,
      secrets: step
        .secrets
        .into_iter()
        .map(|secret| ArtifactStepSecret {
          name: secret.name,
          value: secret.value,
        })
        .collect(),
    }
  }
}

impl From<Artifact> for wire::Artifact {
  fn from(artifact: Artifact) -> Self {
    Self {
      target: system_to_proto(artifact.target),
      name: artifact.name,
      sources: artifact.sources.into_iter().map(Into::into).collect(),
      steps: artifact.steps.into_iter().map(Into::into).collect(),
      systems: artifact.systems.into_iter().map(system_to_proto).collect(),
      aliases: artifact.aliases,
    }
  }
}

impl TryFrom<wire::Artifact> for Artifact {
  type Error = ApiError;

  fn try_from(artifact: wire::Artifact) -> Result<Self, Self::Error> {
    Ok(Self {
      target: system_from_proto(artifact.target)?,
      name: artifact.name,
      sources: artifact.sources.into_iter().map(Into::into).collect(),
      steps: artifact.steps.into_iter().map(Into::into).collect(),
      systems: artifact
        .systems
        .into_iter()
        .map(system_from_proto)
        .collect::<Result<_, _>>()?,
      aliases: artifact.aliases,
    })
  }
}

impl From<PrepareArtifactRequest> for agent::PrepareArtifactRequest {
  fn from(request: PrepareArtifactRequest) -> Self {
    Self {
      artifact: Some(request.artifact.into()),
      system: system_to_proto(request.system),
    }
  }
}

impl TryFrom<agent::PrepareArtifactRequest> for PrepareArtifactRequest {
  type Error = ApiError;

  fn try_from(request: agent::PrepareArtifactRequest) -> Result<Self, Self::Error> {
    Ok(Self {
      artifact: required(request.artifact, "artifact")?.try_into()?,
      system: system_from_proto(request.system)?,
    })
  }
}

impl From<PrepareArtifactResponse> for agent::PrepareArtifactResponse {
  fn from(response: PrepareArtifactResponse) -> Self {
    Self {
      artifact_output: response.artifact_output,
      artifact: response.artifact.map(Into::into),
      artifact_digest: response.artifact_digest,
    }
  }
}

impl TryFrom<agent::PrepareArtifactResponse> for PrepareArtifactResponse {
  type Error = ApiError;

  fn try_from(response: agent::PrepareArtifactResponse) -> Result<Self, Self::Error> {
    Ok(Self {
      artifact_output: response.artifact_output,
      artifact: response.artifact.map(Artifact::try_from).transpose()?,
      artifact_digest: response.artifact_digest,
    })
  }
}

impl From<ConfigResponse> for wire::ConfigResponse {
  fn from(config: ConfigResponse) -> Self {
    Self {
      artifacts: config
        .artifacts
        .into_iter()
        .map(|entry| wire::ConfigArtifact {
          digest: entry.digest,
          artifact: Some(entry.artifact.into()),
        })
        .collect(),
    }
  }
}

impl TryFrom<wire::ConfigResponse> for ConfigResponse {
  type Error = ApiError;

  fn try_from(config: wire::ConfigResponse) -> Result<Self, Self::Error> {
    let artifacts = config
      .artifacts
      .into_iter()
      .map(|entry| {
        Ok(ConfigArtifact {
          artifact: required(entry.artifact, "config artifact")?.try_into()?,
          digest: entry.digest,
        })
      })
      .collect::<Result<_, ApiError>>()?;

    Ok(Self { artifacts })
  }
}

//! A definition program end to end against in-process gRPC agent and
//! registry services.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::{ReceiverStream, TcpListenerStream};
use tonic::transport::Server;
use tonic::{Request, Response, Status};
use vorpal_sdk::api::grpc::{GrpcAgentClient, GrpcRegistryClient};
use vorpal_sdk::api::proto::agent::agent_service_server::{AgentService, AgentServiceServer};
use vorpal_sdk::api::proto::agent::{PrepareArtifactRequest, PrepareArtifactResponse};
use vorpal_sdk::api::proto::artifact as wire;
use vorpal_sdk::api::proto::artifact::artifact_service_server::{ArtifactService, ArtifactServiceServer};
use vorpal_sdk::api::{ApiError, system_from_proto, system_to_proto};
use vorpal_sdk::artifact::ArtifactBuilder;
use vorpal_sdk::{Artifact, ArtifactStep, ArtifactSystem, ConfigContext, ContextError, step};

const SYSTEM: ArtifactSystem = ArtifactSystem::X8664Darwin;

/// Agent that reports the digest of whatever it receives.
#[derive(Clone, Default)]
struct Agent {
  requests: Arc<Mutex<Vec<PrepareArtifactRequest>>>,
  unavailable: bool,
}

#[tonic::async_trait]
impl AgentService for Agent {
  type PrepareArtifactStream = ReceiverStream<Result<PrepareArtifactResponse, Status>>;

  async fn prepare_artifact(
    &self,
    request: Request<PrepareArtifactRequest>,
  ) -> Result<Response<Self::PrepareArtifactStream>, Status> {
    if self.unavailable {
      return Err(Status::unavailable("worker unavailable"));
    }

    let request = request.into_inner();
    self.requests.lock().unwrap().push(request.clone());

    let system = system_from_proto(request.system).map_err(|e| Status::invalid_argument(e.to_string()))?;
    let artifact = request
      .artifact
      .ok_or_else(|| Status::invalid_argument("missing artifact"))
      .and_then(|artifact| Artifact::try_from(artifact).map_err(|e| Status::invalid_argument(e.to_string())))?;
    let digest = artifact
      .digest(system)
      .map_err(|e| Status::internal(e.to_string()))?;

    let (tx, rx) = mpsc::channel(4);
    let messages = [
      PrepareArtifactResponse {
        artifact_output: Some(format!("building {}", artifact.name)),
        ..Default::default()
      },
      PrepareArtifactResponse {
        artifact_digest: Some(digest),
        ..Default::default()
      },
    ];
    for message in messages {
      let _ = tx.send(Ok(message)).await;
    }

    Ok(Response::new(ReceiverStream::new(rx)))
  }
}

/// Registry holding artifacts by digest and aliases by `(alias, system)`.
#[derive(Clone, Default)]
struct Registry {
  artifacts: Arc<BTreeMap<String, Artifact>>,
  aliases: Arc<BTreeMap<(String, i32), String>>,
  alias_lookups: Arc<Mutex<Vec<wire::GetArtifactAliasRequest>>>,
  fetched: Arc<Mutex<Vec<String>>>,
}

#[tonic::async_trait]
impl ArtifactService for Registry {
  async fn get_artifact(&self, request: Request<wire::ArtifactRequest>) -> Result<Response<wire::Artifact>, Status> {
    let digest = request.into_inner().digest;
    self.fetched.lock().unwrap().push(digest.clone());
    match self.artifacts.get(&digest) {
      Some(artifact) => Ok(Response::new(artifact.clone().into())),
      None => Err(Status::not_found(digest)),
    }
  }

  async fn get_artifact_alias(
    &self,
    request: Request<wire::GetArtifactAliasRequest>,
  ) -> Result<Response<wire::GetArtifactAliasResponse>, Status> {
    let request = request.into_inner();
    self.alias_lookups.lock().unwrap().push(request.clone());
    match self.aliases.get(&(request.alias.clone(), request.system)) {
      Some(digest) => Ok(Response::new(wire::GetArtifactAliasResponse { digest: digest.clone() })),
      None => Err(Status::not_found(request.alias)),
    }
  }

  async fn get_artifacts(
    &self,
    _request: Request<wire::ArtifactsRequest>,
  ) -> Result<Response<wire::ArtifactsResponse>, Status> {
    Ok(Response::new(wire::ArtifactsResponse {
      digests: self.artifacts.keys().cloned().collect(),
    }))
  }

  async fn get_config(&self, _request: Request<wire::ConfigRequest>) -> Result<Response<wire::ConfigResponse>, Status> {
    Err(Status::unimplemented("registry has no config"))
  }

  async fn store_artifact(&self, _request: Request<wire::Artifact>) -> Result<Response<wire::ArtifactResponse>, Status> {
    Err(Status::unimplemented("read-only registry"))
  }
}

/// Serve both services on one ephemeral port and return its URL.
async fn start(agent: Agent, registry: Registry) -> String {
  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let url = format!("http://{}", listener.local_addr().unwrap());

  tokio::spawn(
    Server::builder()
      .add_service(AgentServiceServer::new(agent))
      .add_service(ArtifactServiceServer::new(registry))
      .serve_with_incoming(TcpListenerStream::new(listener)),
  );

  url
}

fn context(url: &str, system: ArtifactSystem) -> ConfigContext {
  ConfigContext::new(
    "hello",
    system,
    Arc::new(GrpcAgentClient::new(url).unwrap()),
    Arc::new(GrpcRegistryClient::new(url).unwrap()),
  )
}

async fn hello(context: &ConfigContext) -> Result<String, ContextError> {
  let step = step::shell(context, vec![], vec![], "echo hi > $VORPAL_OUTPUT/out.txt", vec![]).await?;
  ArtifactBuilder::new("hello", vec![step], vec![SYSTEM]).build(context).await
}

#[tokio::test]
async fn hello_is_prepared_once() {
  let agent = Agent::default();
  let url = start(agent.clone(), Registry::default()).await;
  let context = context(&url, SYSTEM);

  let step = step::shell(&context, vec![], vec![], "echo hi > $VORPAL_OUTPUT/out.txt", vec![])
    .await
    .unwrap();
  let expected = ArtifactBuilder::new("hello", vec![step], vec![SYSTEM])
    .into_artifact(SYSTEM)
    .unwrap()
    .digest(SYSTEM)
    .unwrap();

  let first = hello(&context).await.unwrap();
  let second = hello(&context).await.unwrap();

  let requests = agent.requests.lock().unwrap();
  assert_eq!(requests.len(), 1);
  assert_eq!(requests[0].system, system_to_proto(SYSTEM));
  assert_eq!(first, expected);
  assert_eq!(second, first);
  assert_eq!(first.len(), 64);
  assert!(first.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
}

#[tokio::test]
async fn agent_failure_is_fatal() {
  let agent = Agent {
    unavailable: true,
    ..Default::default()
  };
  let url = start(agent, Registry::default()).await;

  let result = hello(&context(&url, SYSTEM)).await;

  assert!(matches!(
    result,
    Err(ContextError::Api(ApiError::Status {
      code: tonic::Code::Unavailable,
      ..
    }))
  ));
}

#[tokio::test]
async fn linux_steps_fetch_the_sandbox_rootfs() {
  let linux = ArtifactSystem::X8664Linux;
  let rootfs = Artifact {
    target: linux,
    name: "linux-vorpal".to_string(),
    steps: vec![ArtifactStep {
      entrypoint: Some("bash".to_string()),
      ..Default::default()
    }],
    systems: vec![linux],
    ..Default::default()
  };
  let rootfs_digest = rootfs.digest(linux).unwrap();
  let alias = "library/linux-vorpal:latest".to_string();

  let registry = Registry {
    artifacts: Arc::new(BTreeMap::from([(rootfs_digest.clone(), rootfs.clone())])),
    aliases: Arc::new(BTreeMap::from([(
      (alias.clone(), system_to_proto(linux)),
      rootfs_digest.clone(),
    )])),
    ..Default::default()
  };
  let url = start(Agent::default(), registry.clone()).await;
  let context = context(&url, linux);

  let first = step::shell(&context, vec![], vec![], "true", vec![]).await.unwrap();
  let second = step::shell(&context, vec![], vec![], "true", vec![]).await.unwrap();

  let lookups = registry.alias_lookups.lock().unwrap();
  assert_eq!(lookups.len(), 1);
  assert_eq!(lookups[0].alias, alias);
  assert_eq!(lookups[0].system, system_to_proto(linux));
  assert_eq!(*registry.fetched.lock().unwrap(), vec![rootfs_digest.clone()]);
  assert_eq!(first, second);
  assert_eq!(first.entrypoint.as_deref(), Some("bwrap"));
  assert_eq!(first.artifacts, vec![rootfs_digest.clone()]);
  assert_eq!(context.get_artifact(&rootfs_digest), Some(rootfs));
}

//! Artifacts this program knows how to declare.

use vorpal_sdk::artifact::{ArgumentBuilder, ArtifactBuilder, get_env_key};
use vorpal_sdk::artifact::environment::DevelopmentEnvironmentBuilder;
use vorpal_sdk::artifact::process::ProcessBuilder;
use vorpal_sdk::{ArtifactSystem, ConfigContext, ContextError, step};

pub const NAMES: [&str; 3] = ["hello", "hello-process", "hello-shell"];

pub async fn build(context: &ConfigContext, name: &str) -> Result<String, ContextError> {
  match name {
    "hello-process" => hello_process(context).await,
    "hello-shell" => hello_shell(context).await,
    _ => hello(context).await,
  }
}

/// Writes a greeting to `$VORPAL_OUTPUT/out.txt`.
async fn hello(context: &ConfigContext) -> Result<String, ContextError> {
  let greeting = ArgumentBuilder::new("greeting")
    .build(context)?
    .unwrap_or_else(|| "hi".to_string());

  let script = format!("echo {} > $VORPAL_OUTPUT/out.txt", greeting);
  let step = step::shell(context, vec![], vec![], &script, vec![]).await?;

  ArtifactBuilder::new("hello", vec![step], ArtifactSystem::ALL.to_vec())
    .with_aliases(vec!["hello:latest".to_string()])
    .build(context)
    .await
}

async fn hello_process(context: &ConfigContext) -> Result<String, ContextError> {
  let hello = hello(context).await?;

  ProcessBuilder::new("hello-process", "tail", ArtifactSystem::ALL.to_vec())
    .with_arguments(vec!["-f".to_string(), format!("{}/out.txt", get_env_key(&hello))])
    .with_artifacts(vec![hello])
    .build(context)
    .await
}

async fn hello_shell(context: &ConfigContext) -> Result<String, ContextError> {
  let hello = hello(context).await?;

  DevelopmentEnvironmentBuilder::new("hello-shell", ArtifactSystem::ALL.to_vec())
    .with_artifacts(vec![hello])
    .with_environments(vec!["HELLO_GREETING=hi".to_string()])
    .build(context)
    .await
}

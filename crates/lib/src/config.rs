//! Command-line configuration for artifact-definition programs.
//!
//! The orchestrating CLI starts a definition program as
//! `<program> start --agent <url> --registry <url> --system <system> ...`.
//! [`ContextArgs`] parses those flags and [`ContextArgs::into_context`]
//! turns them into a [`ConfigContext`] wired to the gRPC clients.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use crate::api::grpc::{GrpcAgentClient, GrpcRegistryClient};
use crate::consts::{DEFAULT_AGENT, DEFAULT_PORT, DEFAULT_REGISTRY};
use crate::context::{ConfigContext, ContextError};
use crate::paths::source_cache_dir;
use crate::system::ArtifactSystem;

#[derive(Debug, Parser)]
#[command(author, version, about = "Declare an artifact graph and serve it to the orchestrator", long_about = None)]
pub struct Cli {
  #[command(subcommand)]
  pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
  /// Build the artifact graph and serve it until interrupted
  Start(ContextArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ContextArgs {
  /// Agent service address
  #[arg(long, default_value = DEFAULT_AGENT)]
  pub agent: String,

  /// Registry service address
  #[arg(long, default_value = DEFAULT_REGISTRY)]
  pub registry: String,

  /// Target system (defaults to the host)
  #[arg(long, default_value_t = ArtifactSystem::current())]
  pub system: ArtifactSystem,

  /// Port for the local graph server
  #[arg(long, default_value_t = DEFAULT_PORT)]
  pub port: u16,

  /// Name of the artifact the orchestrator asked for
  #[arg(long)]
  pub artifact: String,

  /// Variable passed to the definition as key=value (repeatable)
  #[arg(long = "variable", value_name = "KEY=VALUE")]
  pub variables: Vec<String>,

  /// Source archive cache (defaults to the user cache directory)
  #[arg(long)]
  pub source_cache: Option<PathBuf>,
}

/// Parse `key=value` pairs. Later duplicates win.
pub fn parse_variables(variables: &[String]) -> Result<BTreeMap<String, String>, ContextError> {
  let mut parsed = BTreeMap::new();
  for variable in variables {
    match variable.split_once('=') {
      Some((key, value)) if !key.is_empty() => {
        parsed.insert(key.to_string(), value.to_string());
      }
      _ => return Err(ContextError::InvalidVariable(variable.clone())),
    }
  }
  Ok(parsed)
}

impl ContextArgs {
  pub fn into_context(self) -> Result<ConfigContext, ContextError> {
    let variables = parse_variables(&self.variables)?;
    let agent = Arc::new(GrpcAgentClient::new(&self.agent)?);
    let registry = Arc::new(GrpcRegistryClient::new(&self.registry)?);

    Ok(
      ConfigContext::new(self.artifact, self.system, agent, registry)
        .with_port(self.port)
        .with_variables(variables)
        .with_source_cache_dir(self.source_cache.unwrap_or_else(source_cache_dir)),
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn parse(args: &[&str]) -> ContextArgs {
    let cli = Cli::try_parse_from(std::iter::once("vorpal-config").chain(args.iter().copied())).unwrap();
    match cli.command {
      Command::Start(args) => args,
    }
  }

  #[test]
  fn defaults_apply() {
    let args = parse(&["start", "--artifact", "hello"]);

    assert_eq!(args.agent, DEFAULT_AGENT);
    assert_eq!(args.registry, DEFAULT_REGISTRY);
    assert_eq!(args.port, DEFAULT_PORT);
    assert_eq!(args.system, ArtifactSystem::current());
    assert!(args.variables.is_empty());
  }

  #[test]
  fn flags_are_parsed() {
    let args = parse(&[
      "start",
      "--agent",
      "http://agent:1",
      "--registry",
      "http://registry:2",
      "--system",
      "aarch64-linux",
      "--port",
      "9000",
      "--artifact",
      "hello",
      "--variable",
      "version=1.0",
      "--variable",
      "flags=a=b",
    ]);

    assert_eq!(args.system, ArtifactSystem::Aarch64Linux);
    assert_eq!(args.port, 9000);

    let context = args.into_context().unwrap();
    assert_eq!(context.get_system(), ArtifactSystem::Aarch64Linux);
    assert_eq!(context.get_port(), 9000);
    assert_eq!(context.get_artifact_name(), "hello");
    assert_eq!(context.get_variable("version").as_deref(), Some("1.0"));
    assert_eq!(context.get_variable("flags").as_deref(), Some("a=b"));
  }

  #[test]
  fn malformed_agent_address_is_rejected() {
    let args = parse(&["start", "--artifact", "hello", "--agent", "not a url"]);

    assert!(matches!(
      args.into_context(),
      Err(ContextError::Api(crate::api::ApiError::InvalidEndpoint(url))) if url == "not a url"
    ));
  }

  #[test]
  fn invalid_system_is_rejected() {
    let result = Cli::try_parse_from(["vorpal-config", "start", "--artifact", "a", "--system", "sparc-solaris"]);
    assert!(result.is_err());
  }

  #[test]
  fn variables_need_a_key() {
    assert!(matches!(
      parse_variables(&["novalue".to_string()]),
      Err(ContextError::InvalidVariable(v)) if v == "novalue"
    ));
    assert!(matches!(
      parse_variables(&["=value".to_string()]),
      Err(ContextError::InvalidVariable(_))
    ));
    assert_eq!(parse_variables(&["a=1".to_string(), "a=2".to_string()]).unwrap()["a"], "2");
  }
}

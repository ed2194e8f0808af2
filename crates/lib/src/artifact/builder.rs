//! Builders for artifacts, steps, sources and arguments.
//!
//! Builders only collect values. Validation happens in `build`, which for
//! artifacts also submits the result through the [`ConfigContext`].

use std::collections::BTreeMap;

use crate::context::{ConfigContext, ContextError};
use crate::system::ArtifactSystem;

use super::alias::ArtifactAlias;
use super::types::{Artifact, ArtifactSource, ArtifactStep, ArtifactStepSecret};

/// Reads a variable passed with `--variable name=value`.
#[derive(Debug, Clone)]
pub struct ArgumentBuilder {
  name: String,
  require: bool,
}

impl ArgumentBuilder {
  pub fn new(name: &str) -> Self {
    Self {
      name: name.to_string(),
      require: false,
    }
  }

  pub fn with_require(mut self) -> Self {
    self.require = true;
    self
  }

  pub fn build(self, context: &ConfigContext) -> Result<Option<String>, ContextError> {
    match context.get_variable(&self.name) {
      Some(value) => Ok(Some(value)),
      None if self.require => Err(ContextError::MissingVariable(self.name)),
      None => Ok(None),
    }
  }
}

#[derive(Debug, Clone)]
pub struct ArtifactSourceBuilder {
  name: String,
  path: String,
  digest: Option<String>,
  includes: Vec<String>,
  excludes: Vec<String>,
}

impl ArtifactSourceBuilder {
  pub fn new(name: &str, path: &str) -> Self {
    Self {
      name: name.to_string(),
      path: path.to_string(),
      digest: None,
      includes: vec![],
      excludes: vec![],
    }
  }

  pub fn with_digest(mut self, digest: &str) -> Self {
    self.digest = Some(digest.to_string());
    self
  }

  pub fn with_includes(mut self, includes: Vec<String>) -> Self {
    self.includes = includes;
    self
  }

  pub fn with_excludes(mut self, excludes: Vec<String>) -> Self {
    self.excludes = excludes;
    self
  }

  pub fn build(self) -> ArtifactSource {
    ArtifactSource {
      name: self.name,
      path: self.path,
      digest: self.digest,
      includes: self.includes,
      excludes: self.excludes,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct StepVariant {
  entrypoint: Option<String>,
  script: Option<String>,
  arguments: Vec<String>,
  artifacts: Vec<String>,
  environments: Vec<String>,
  secrets: Vec<ArtifactStepSecret>,
}

/// A step declared per system.
///
/// Every `with_*` call applies its value to the listed systems only. At
/// build time the variant for the context's system is materialized; the
/// others are discarded.
#[derive(Debug, Clone, Default)]
pub struct ArtifactStepBuilder {
  variants: BTreeMap<ArtifactSystem, StepVariant>,
}

impl ArtifactStepBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  fn update(mut self, systems: &[ArtifactSystem], apply: impl Fn(&mut StepVariant)) -> Self {
    for system in systems {
      apply(self.variants.entry(*system).or_default());
    }
    self
  }

  pub fn with_entrypoint(self, entrypoint: &str, systems: &[ArtifactSystem]) -> Self {
    self.update(systems, |variant| variant.entrypoint = Some(entrypoint.to_string()))
  }

  pub fn with_script(self, script: &str, systems: &[ArtifactSystem]) -> Self {
    self.update(systems, |variant| variant.script = Some(script.to_string()))
  }

  pub fn with_arguments(self, arguments: &[String], systems: &[ArtifactSystem]) -> Self {
    self.update(systems, |variant| variant.arguments = arguments.to_vec())
  }

  pub fn with_artifacts(self, artifacts: &[String], systems: &[ArtifactSystem]) -> Self {
    self.update(systems, |variant| variant.artifacts = artifacts.to_vec())
  }

  pub fn with_environments(self, environments: &[String], systems: &[ArtifactSystem]) -> Self {
    self.update(systems, |variant| variant.environments = environments.to_vec())
  }

  pub fn with_secrets(self, secrets: &[ArtifactStepSecret], systems: &[ArtifactSystem]) -> Self {
    self.update(systems, |variant| variant.secrets = secrets.to_vec())
  }

  pub fn build(self, context: &ConfigContext) -> Result<ArtifactStep, ContextError> {
    self.materialize(context.get_system())
  }

  fn materialize(mut self, system: ArtifactSystem) -> Result<ArtifactStep, ContextError> {
    let variant = self
      .variants
      .remove(&system)
      .ok_or(ContextError::UnsupportedSystem(system))?;

    Ok(ArtifactStep {
      entrypoint: variant.entrypoint,
      script: variant.script,
      arguments: variant.arguments,
      artifacts: variant.artifacts,
      environments: variant.environments,
      secrets: variant.secrets,
    })
  }
}

fn push_unique<T: PartialEq>(values: &mut Vec<T>, value: T) {
  if !values.contains(&value) {
    values.push(value);
  }
}

#[derive(Debug, Clone)]
pub struct ArtifactBuilder {
  name: String,
  aliases: Vec<String>,
  sources: Vec<ArtifactSource>,
  steps: Vec<ArtifactStep>,
  systems: Vec<ArtifactSystem>,
}

impl ArtifactBuilder {
  pub fn new(name: &str, steps: Vec<ArtifactStep>, systems: Vec<ArtifactSystem>) -> Self {
    Self {
      name: name.to_string(),
      aliases: vec![],
      sources: vec![],
      steps: vec![],
      systems: vec![],
    }
    .with_steps(steps)
    .with_systems(systems)
  }

  pub fn with_aliases(mut self, aliases: Vec<String>) -> Self {
    for alias in aliases {
      push_unique(&mut self.aliases, alias);
    }
    self
  }

  /// Sources are unique by name; the first declaration wins.
  pub fn with_sources(mut self, sources: Vec<ArtifactSource>) -> Self {
    for source in sources {
      if !self.sources.iter().any(|existing| existing.name == source.name) {
        self.sources.push(source);
      }
    }
    self
  }

  pub fn with_steps(mut self, steps: Vec<ArtifactStep>) -> Self {
    for step in steps {
      push_unique(&mut self.steps, step);
    }
    self
  }

  pub fn with_systems(mut self, systems: Vec<ArtifactSystem>) -> Self {
    for system in systems {
      push_unique(&mut self.systems, system);
    }
    self
  }

  /// Validate against `system` and produce the artifact without submitting it.
  pub fn into_artifact(self, system: ArtifactSystem) -> Result<Artifact, ContextError> {
    if self.name.is_empty() {
      return Err(ContextError::EmptyName);
    }
    if self.steps.is_empty() {
      return Err(ContextError::EmptySteps(self.name));
    }
    if !self.systems.contains(&system) {
      return Err(ContextError::UnsupportedSystem(system));
    }
    for alias in &self.aliases {
      alias.parse::<ArtifactAlias>()?;
    }

    Ok(Artifact {
      target: system,
      name: self.name,
      sources: self.sources,
      steps: self.steps,
      systems: self.systems,
      aliases: self.aliases,
    })
  }

  /// Validate, resolve every source, submit and return the artifact's digest.
  ///
  /// The computed digest of each source is pinned on the submitted artifact.
  pub async fn build(self, context: &ConfigContext) -> Result<String, ContextError> {
    let mut artifact = self.into_artifact(context.get_system())?;

    for source in &mut artifact.sources {
      let resolved = context.resolve_source(source).await?;
      source.digest = Some(resolved.digest);
    }

    context.add_artifact(&artifact).await
  }
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;
  use std::fs;

  use tempfile::TempDir;

  use super::*;
  use crate::source::SourceError;
  use crate::testutil::test_context;

  const LINUX: ArtifactSystem = ArtifactSystem::X8664Linux;
  const DARWIN: ArtifactSystem = ArtifactSystem::Aarch64Darwin;

  fn script_step(script: &str) -> ArtifactStep {
    ArtifactStep {
      entrypoint: Some("bash".to_string()),
      script: Some(script.to_string()),
      ..Default::default()
    }
  }

  #[test]
  fn step_builder_materializes_active_system() {
    let builder = ArtifactStepBuilder::new()
      .with_entrypoint("bash", &[LINUX, DARWIN])
      .with_script("make linux", &[LINUX])
      .with_script("make darwin", &[DARWIN])
      .with_environments(&["CC=clang".to_string()], &[DARWIN]);

    let linux = builder.clone().materialize(LINUX).unwrap();
    assert_eq!(linux.script.as_deref(), Some("make linux"));
    assert!(linux.environments.is_empty());

    let darwin = builder.materialize(DARWIN).unwrap();
    assert_eq!(darwin.script.as_deref(), Some("make darwin"));
    assert_eq!(darwin.environments, vec!["CC=clang"]);
  }

  #[test]
  fn step_builder_without_variant_is_unsupported() {
    let builder = ArtifactStepBuilder::new().with_script("true", &[LINUX]);

    let result = builder.materialize(ArtifactSystem::Aarch64Linux);

    assert!(matches!(
      result,
      Err(ContextError::UnsupportedSystem(ArtifactSystem::Aarch64Linux))
    ));
  }

  #[test]
  fn artifact_builder_deduplicates() {
    let source = ArtifactSourceBuilder::new("src", ".").build();
    let renamed = ArtifactSourceBuilder::new("src", "./other").build();

    let artifact = ArtifactBuilder::new("hello", vec![script_step("a"), script_step("a")], vec![LINUX, LINUX])
      .with_sources(vec![source.clone(), renamed])
      .with_aliases(vec!["hello:1".to_string(), "hello:1".to_string()])
      .with_steps(vec![script_step("b")])
      .into_artifact(LINUX)
      .unwrap();

    assert_eq!(artifact.sources, vec![source]);
    assert_eq!(artifact.steps.len(), 2);
    assert_eq!(artifact.systems, vec![LINUX]);
    assert_eq!(artifact.aliases, vec!["hello:1"]);
    assert_eq!(artifact.target, LINUX);
  }

  #[test]
  fn artifact_builder_validates() {
    assert!(matches!(
      ArtifactBuilder::new("hello", vec![], vec![LINUX]).into_artifact(LINUX),
      Err(ContextError::EmptySteps(name)) if name == "hello"
    ));
    assert!(matches!(
      ArtifactBuilder::new("", vec![script_step("a")], vec![LINUX]).into_artifact(LINUX),
      Err(ContextError::EmptyName)
    ));
    assert!(matches!(
      ArtifactBuilder::new("hello", vec![script_step("a")], vec![LINUX]).into_artifact(DARWIN),
      Err(ContextError::UnsupportedSystem(DARWIN))
    ));
    assert!(matches!(
      ArtifactBuilder::new("hello", vec![script_step("a")], vec![LINUX])
        .with_aliases(vec!["bad alias".to_string()])
        .into_artifact(LINUX),
      Err(ContextError::Alias(_))
    ));
  }

  #[tokio::test]
  async fn build_submits_through_context() {
    let (context, agent, _) = test_context(LINUX);
    let builder = ArtifactBuilder::new("hello", vec![script_step("echo hello")], vec![LINUX, DARWIN]);

    let digest = builder.clone().build(&context).await.unwrap();
    let again = builder.build(&context).await.unwrap();

    assert_eq!(digest, again);
    assert_eq!(agent.calls(), 1);
    assert_eq!(context.get_artifact(&digest).unwrap().name, "hello");
  }

  #[tokio::test]
  async fn build_pins_source_digests() {
    let tree = TempDir::new().unwrap();
    fs::write(tree.path().join("main.c"), "int main() { return 0; }\n").unwrap();
    let cache = TempDir::new().unwrap();
    let (context, agent, _) = test_context(LINUX);
    let context = context.with_source_cache_dir(cache.path());

    let source = ArtifactSourceBuilder::new("src", tree.path().to_str().unwrap()).build();
    let expected = context.resolve_source(&source).await.unwrap().digest;

    let digest = ArtifactBuilder::new("hello", vec![script_step("cc main.c")], vec![LINUX])
      .with_sources(vec![source])
      .build(&context)
      .await
      .unwrap();

    let requests = agent.requests.lock().unwrap();
    assert_eq!(requests[0].artifact.sources[0].digest.as_deref(), Some(expected.as_str()));
    assert_eq!(
      context.get_artifact(&digest).unwrap().sources[0].digest.as_deref(),
      Some(expected.as_str())
    );
  }

  #[tokio::test]
  async fn build_rejects_wrong_source_digest() {
    let tree = TempDir::new().unwrap();
    fs::write(tree.path().join("main.c"), "int main() { return 0; }\n").unwrap();
    let cache = TempDir::new().unwrap();
    let (context, agent, _) = test_context(LINUX);
    let context = context.with_source_cache_dir(cache.path());

    let source = ArtifactSourceBuilder::new("src", tree.path().to_str().unwrap())
      .with_digest("0000")
      .build();
    let result = ArtifactBuilder::new("hello", vec![script_step("cc main.c")], vec![LINUX])
      .with_sources(vec![source])
      .build(&context)
      .await;

    assert!(matches!(
      result,
      Err(ContextError::Source(SourceError::DigestMismatch { expected, .. })) if expected == "0000"
    ));
    assert_eq!(agent.calls(), 0);
  }

  #[test]
  fn source_builder() {
    let source = ArtifactSourceBuilder::new("src", "https://example.com/src.tar.gz")
      .with_digest("abc")
      .with_includes(vec!["src".to_string()])
      .with_excludes(vec!["src/tests".to_string()])
      .build();

    assert_eq!(source.digest.as_deref(), Some("abc"));
    assert_eq!(source.includes, vec!["src"]);
    assert_eq!(source.excludes, vec!["src/tests"]);
  }

  #[test]
  fn arguments_read_variables() {
    let (context, _, _) = test_context(LINUX);
    let context = context.with_variables(BTreeMap::from([("version".to_string(), "2.0".to_string())]));

    assert_eq!(
      ArgumentBuilder::new("version").with_require().build(&context).unwrap().as_deref(),
      Some("2.0")
    );
    assert_eq!(ArgumentBuilder::new("optional").build(&context).unwrap(), None);
    assert!(matches!(
      ArgumentBuilder::new("token").with_require().build(&context),
      Err(ContextError::MissingVariable(name)) if name == "token"
    ));
  }
}

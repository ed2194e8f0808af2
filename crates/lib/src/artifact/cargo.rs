//! Rust crates built with Cargo.
//!
//! Two artifacts are produced from the same declared source. `<name>-vendor`
//! runs `cargo vendor` with network access and keeps the vendored registry.
//! The main artifact builds offline against it and installs the requested
//! binaries.
//!
//! Sources are unpacked by the worker under `./source/<source name>`.

use crate::context::{ConfigContext, ContextError};
use crate::step;
use crate::system::ArtifactSystem;

use super::builder::ArtifactBuilder;
use super::get_env_key;
use super::types::ArtifactSource;

#[derive(Debug, Clone)]
pub struct CargoBuilder {
  name: String,
  toolchain: String,
  source: ArtifactSource,
  bins: Vec<String>,
  artifacts: Vec<String>,
  environments: Vec<String>,
  systems: Vec<ArtifactSystem>,
}

impl CargoBuilder {
  /// `toolchain` is the digest of an artifact providing `bin/cargo` and `bin/rustc`.
  pub fn new(name: &str, toolchain: &str, source: ArtifactSource, systems: Vec<ArtifactSystem>) -> Self {
    Self {
      name: name.to_string(),
      toolchain: toolchain.to_string(),
      source,
      bins: vec![name.to_string()],
      artifacts: vec![],
      environments: vec![],
      systems,
    }
  }

  pub fn with_bins(mut self, bins: Vec<String>) -> Self {
    self.bins = bins;
    self
  }

  /// Extra build dependencies, e.g. native libraries.
  pub fn with_artifacts(mut self, artifacts: Vec<String>) -> Self {
    self.artifacts = artifacts;
    self
  }

  pub fn with_environments(mut self, environments: Vec<String>) -> Self {
    self.environments = environments;
    self
  }

  fn source_dir(&self) -> String {
    format!("./source/{}", self.source.name)
  }

  fn cargo_environments(&self) -> Vec<String> {
    let mut environments = vec!["CARGO_HOME=$VORPAL_WORKSPACE/.cargo-home".to_string()];
    environments.extend(self.environments.iter().cloned());
    environments
  }

  pub fn vendor_script(&self) -> String {
    format!(
      r#"pushd {source}

mkdir -pv $VORPAL_OUTPUT

cargo vendor --locked --versioned-dirs $VORPAL_OUTPUT/vendor
"#,
      source = self.source_dir(),
    )
  }

  pub fn build_script(&self, vendor: &str, system: ArtifactSystem) -> Result<String, ContextError> {
    let target = system.rust_target().ok_or(ContextError::UnsupportedSystem(system))?;

    let install = self
      .bins
      .iter()
      .map(|bin| format!("cp -pv target/{target}/release/{bin} $VORPAL_OUTPUT/bin/{bin}"))
      .collect::<Vec<_>>()
      .join("\n");

    Ok(format!(
      r#"pushd {source}

mkdir -pv .cargo $VORPAL_OUTPUT/bin

cat > .cargo/config.toml << EOF
[source.crates-io]
replace-with = "vendored-sources"

[source.vendored-sources]
directory = "{vendor}/vendor"
EOF

cargo build --offline --locked --release --target {target}

{install}
"#,
      source = self.source_dir(),
      vendor = get_env_key(vendor),
    ))
  }

  /// Build both artifacts and return the digest of the installed binaries.
  pub async fn build(self, context: &ConfigContext) -> Result<String, ContextError> {
    let system = context.get_system();

    let mut toolchain = vec![self.toolchain.clone()];
    toolchain.extend(self.artifacts.iter().cloned());

    let vendor_step = step::shell(
      context,
      toolchain.clone(),
      self.cargo_environments(),
      &self.vendor_script(),
      vec![],
    )
    .await?;

    let vendor = ArtifactBuilder::new(&format!("{}-vendor", self.name), vec![vendor_step], self.systems.clone())
      .with_sources(vec![self.source.clone()])
      .build(context)
      .await?;

    let mut artifacts = toolchain;
    artifacts.push(vendor.clone());

    let build_step = step::shell(
      context,
      artifacts,
      self.cargo_environments(),
      &self.build_script(&vendor, system)?,
      vec![],
    )
    .await?;

    ArtifactBuilder::new(&self.name, vec![build_step], self.systems)
      .with_sources(vec![self.source])
      .build(context)
      .await
  }
}

//! Artifacts and the builders that declare them.
//!
//! [`builder`] holds the primitive builders. [`process`], [`environment`]
//! and [`cargo`] compose them into common artifact shapes by generating
//! step scripts.

pub mod alias;
pub mod builder;
pub mod cargo;
pub mod digest;
pub mod environment;
pub mod process;
mod types;

pub use builder::{ArgumentBuilder, ArtifactBuilder, ArtifactSourceBuilder, ArtifactStepBuilder};
pub use types::{Artifact, ArtifactSource, ArtifactStep, ArtifactStepSecret, get_env_key};

/// Script fragment that writes an executable file under `$VORPAL_OUTPUT/bin`.
///
/// The heredoc is unquoted: dependency tokens and `$VORPAL_OUTPUT` expand
/// while the step runs. Anything meant for run time must be written as `\$`.
pub(crate) fn write_bin(name: &str, body: &str) -> String {
  format!(
    "cat > $VORPAL_OUTPUT/bin/{name} << EOF\n{body}\nEOF\n\nchmod +x $VORPAL_OUTPUT/bin/{name}\n",
    name = name,
    body = body.trim_end(),
  )
}

/// `$VORPAL_ARTIFACT_<digest>/bin` for each dependency, joined with `:`.
pub(crate) fn bin_path(artifacts: &[String]) -> String {
  artifacts
    .iter()
    .map(|digest| format!("{}/bin", get_env_key(digest)))
    .collect::<Vec<_>>()
    .join(":")
}

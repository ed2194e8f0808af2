//! Human-readable artifact references and per-system lookup tables.
//!
//! Aliases have the form `[namespace/]name:tag`. The namespace defaults to
//! `library` and the tag to `latest`.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::consts::{DEFAULT_ALIAS_NAMESPACE, DEFAULT_ALIAS_TAG};
use crate::system::ArtifactSystem;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AliasError {
  #[error("alias is empty")]
  Empty,

  #[error("invalid alias '{alias}': {reason}")]
  Invalid { alias: String, reason: String },

  #[error("no entry for system {0}")]
  UnsupportedSystem(ArtifactSystem),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactAlias {
  pub namespace: String,
  pub name: String,
  pub tag: String,
}

fn valid_component(component: &str) -> bool {
  !component.is_empty()
    && component
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

impl FromStr for ArtifactAlias {
  type Err = AliasError;

  fn from_str(alias: &str) -> Result<Self, Self::Err> {
    if alias.is_empty() {
      return Err(AliasError::Empty);
    }

    let invalid = |reason: &str| AliasError::Invalid {
      alias: alias.to_string(),
      reason: reason.to_string(),
    };

    let (namespace, rest) = match alias.split_once('/') {
      Some((namespace, rest)) => (namespace, rest),
      None => (DEFAULT_ALIAS_NAMESPACE, alias),
    };

    let (name, tag) = match rest.split_once(':') {
      Some((name, tag)) => (name, tag),
      None => (rest, DEFAULT_ALIAS_TAG),
    };

    if !valid_component(namespace) {
      return Err(invalid("invalid namespace"));
    }
    if !valid_component(name) {
      return Err(invalid("invalid name"));
    }
    if !valid_component(tag) {
      return Err(invalid("invalid tag"));
    }

    Ok(Self {
      namespace: namespace.to_string(),
      name: name.to_string(),
      tag: tag.to_string(),
    })
  }
}

impl fmt::Display for ArtifactAlias {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}:{}", self.namespace, self.name, self.tag)
  }
}

/// Select the entry for `system` from a literal per-system table.
///
/// Per-tool digest and alias tables are plain data; this is the one lookup
/// they all share.
pub fn select_for_system<T>(table: &[(ArtifactSystem, T)], system: ArtifactSystem) -> Result<&T, AliasError> {
  table
    .iter()
    .find(|(entry, _)| *entry == system)
    .map(|(_, value)| value)
    .ok_or(AliasError::UnsupportedSystem(system))
}

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Target system an artifact is materialized for (e.g., "aarch64-darwin").
///
/// Selects the step variant, the source variant and the sandbox strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum ArtifactSystem {
  #[default]
  #[serde(rename = "unknown")]
  Unknown,
  #[serde(rename = "aarch64-darwin")]
  Aarch64Darwin,
  #[serde(rename = "aarch64-linux")]
  Aarch64Linux,
  #[serde(rename = "x86_64-darwin")]
  X8664Darwin,
  #[serde(rename = "x86_64-linux")]
  X8664Linux,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown system: {0}")]
pub struct ParseSystemError(pub String);

impl ArtifactSystem {
  pub const ALL: [ArtifactSystem; 4] = [
    Self::Aarch64Darwin,
    Self::Aarch64Linux,
    Self::X8664Darwin,
    Self::X8664Linux,
  ];

  /// Detect the host system at runtime
  ///
  /// Returns `Unknown` if the OS or architecture is not supported
  pub fn current() -> Self {
    match (std::env::consts::ARCH, std::env::consts::OS) {
      ("aarch64", "macos") => Self::Aarch64Darwin,
      ("aarch64", "linux") => Self::Aarch64Linux,
      ("x86_64", "macos") => Self::X8664Darwin,
      ("x86_64", "linux") => Self::X8664Linux,
      _ => Self::Unknown,
    }
  }

  /// Returns the platform triple string (e.g., "aarch64-darwin")
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Unknown => "unknown",
      Self::Aarch64Darwin => "aarch64-darwin",
      Self::Aarch64Linux => "aarch64-linux",
      Self::X8664Darwin => "x86_64-darwin",
      Self::X8664Linux => "x86_64-linux",
    }
  }

  pub fn is_darwin(&self) -> bool {
    matches!(self, Self::Aarch64Darwin | Self::X8664Darwin)
  }

  pub fn is_linux(&self) -> bool {
    matches!(self, Self::Aarch64Linux | Self::X8664Linux)
  }

  /// Rust target triple for this system, used by compiled-language builders.
  pub fn rust_target(&self) -> Option<&'static str> {
    match self {
      Self::Aarch64Darwin => Some("aarch64-apple-darwin"),
      Self::Aarch64Linux => Some("aarch64-unknown-linux-gnu"),
      Self::X8664Darwin => Some("x86_64-apple-darwin"),
      Self::X8664Linux => Some("x86_64-unknown-linux-gnu"),
      Self::Unknown => None,
    }
  }
}

impl fmt::Display for ArtifactSystem {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for ArtifactSystem {
  type Err = ParseSystemError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "unknown" => Ok(Self::Unknown),
      "aarch64-darwin" => Ok(Self::Aarch64Darwin),
      "aarch64-linux" => Ok(Self::Aarch64Linux),
      "x86_64-darwin" => Ok(Self::X8664Darwin),
      "x86_64-linux" => Ok(Self::X8664Linux),
      other => Err(ParseSystemError(other.to_string())),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn triple_format() {
    assert_eq!(ArtifactSystem::Aarch64Darwin.as_str(), "aarch64-darwin");
    assert_eq!(ArtifactSystem::X8664Linux.to_string(), "x86_64-linux");
  }

  #[test]
  fn parse_roundtrips_every_system() {
    for system in ArtifactSystem::ALL {
      assert_eq!(system.as_str().parse::<ArtifactSystem>().unwrap(), system);
    }
    assert!("riscv64-linux".parse::<ArtifactSystem>().is_err());
  }

  #[test]
  fn serializes_as_triple() {
    let json = serde_json::to_string(&ArtifactSystem::X8664Darwin).unwrap();
    assert_eq!(json, "\"x86_64-darwin\"");
  }

  #[test]
  fn families_are_disjoint() {
    for system in ArtifactSystem::ALL {
      assert_ne!(system.is_darwin(), system.is_linux());
    }
    assert!(!ArtifactSystem::Unknown.is_darwin());
    assert!(!ArtifactSystem::Unknown.is_linux());
  }
}

//! Canonical artifact digests.
//!
//! The digest is the only identity shared across SDKs, so the encoding is
//! fixed:
//!
//! 1. `target` is set to the system being digested for.
//! 2. Step secrets are sorted by name and aliases lexicographically. Every
//!    other collection keeps its declared order.
//! 3. The artifact is serialized as compact JSON with fields in declaration
//!    order and absent optionals as `null`.
//! 4. The bytes are hashed with SHA-256 and hex-encoded (lowercase).

use crate::system::ArtifactSystem;
use crate::util::hash::hash_bytes;

use super::types::Artifact;

pub type DigestError = serde_json::Error;

/// Returns the artifact in canonical form for `system`.
pub fn canonicalize(artifact: &Artifact, system: ArtifactSystem) -> Artifact {
  let mut canonical = artifact.clone();
  canonical.target = system;
  canonical.aliases.sort();
  for step in &mut canonical.steps {
    step.secrets.sort_by(|a, b| a.name.cmp(&b.name));
  }
  canonical
}

/// Compute the digest of `artifact` materialized for `system`.
pub fn digest(artifact: &Artifact, system: ArtifactSystem) -> Result<String, DigestError> {
  let canonical = canonicalize(artifact, system);
  let serialized = serde_json::to_vec(&canonical)?;
  Ok(hash_bytes(&serialized).0)
}

impl Artifact {
  pub fn digest(&self, system: ArtifactSystem) -> Result<String, DigestError> {
    digest(self, system)
  }
}

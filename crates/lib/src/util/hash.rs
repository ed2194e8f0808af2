//! Hashing utilities for content addressing and source verification.
//!
//! - `ContentHash`: a full 64-character SHA-256 hex digest
//! - `hash_bytes()`: arbitrary byte hashing
//! - `hash_file()`: single file hashing
//! - `hash_files()`: combined hash over an ordered file set

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A full 64-character lowercase SHA-256 hex digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

#[derive(Debug, thiserror::Error)]
pub enum HashError {
  #[error("failed to read file {path}: {source}")]
  ReadFile {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("no files to hash")]
  NoFiles,
}

pub fn hash_bytes(data: &[u8]) -> ContentHash {
  let mut hasher = Sha256::new();
  hasher.update(data);
  ContentHash(hex::encode(hasher.finalize()))
}

pub fn hash_file(path: &Path) -> Result<ContentHash, HashError> {
  let read_err = |source| HashError::ReadFile {
    path: path.to_path_buf(),
    source,
  };

  let mut file = fs::File::open(path).map_err(read_err)?;
  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 8192];

  loop {
    let bytes_read = file.read(&mut buffer).map_err(read_err)?;
    if bytes_read == 0 {
      break;
    }
    hasher.update(&buffer[..bytes_read]);
  }

  Ok(ContentHash(hex::encode(hasher.finalize())))
}

/// Combined hash of a file set.
///
/// Each file is hashed, then the per-file hex digests are hashed in the
/// order given. Callers pass a sorted list for determinism. Directories and
/// other non-regular entries are skipped.
pub fn hash_files(paths: &[PathBuf]) -> Result<ContentHash, HashError> {
  let mut hasher = Sha256::new();
  let mut count = 0usize;

  for path in paths {
    if !path.is_file() {
      continue;
    }
    let file_hash = hash_file(path)?;
    hasher.update(file_hash.0.as_bytes());
    count += 1;
  }

  if count == 0 {
    return Err(HashError::NoFiles);
  }

  Ok(ContentHash(hex::encode(hasher.finalize())))
}

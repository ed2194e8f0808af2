//! Source resolution.
//!
//! Turns a declared [`ArtifactSource`] into a hashed, cached tree:
//!
//! 1. Classify the path as local, http(s) or git (unsupported).
//! 2. Materialize the filtered file set into scratch storage, downloading and
//!    unpacking remote sources.
//! 3. Normalize timestamps, hash the file set and verify any declared digest.
//! 4. Archive the tree as `<name>-<digest>.tar.zst` in the cache directory.
//!
//! When the digest is known up front the registry and the local cache are
//! consulted first, and work only happens on a double miss.

pub mod archive;
pub mod fetch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::api::{ApiError, ArchiveExistsRequest, RegistryService};
use crate::artifact::ArtifactSource;
use crate::consts::SOURCE_ARCHIVE_KIND;
use crate::util::files::{FilesError, copy_files, get_file_paths, set_timestamps};
use crate::util::hash::{HashError, hash_files};

#[derive(Debug, Error)]
pub enum SourceError {
  #[error("source path does not exist: {0}")]
  PathNotFound(PathBuf),

  #[error("source '{0}' is remote and must declare a digest")]
  MissingDigest(String),

  #[error("git sources are not supported: {0}")]
  UnsupportedGit(String),

  #[error("unsupported content type: {0}")]
  UnsupportedContentType(PathBuf),

  #[error("fetch failed for {url}: {message}")]
  Fetch { url: String, message: String },

  #[error("digest mismatch for source '{name}': expected {expected}, got {actual}")]
  DigestMismatch {
    name: String,
    expected: String,
    actual: String,
  },

  #[error("source '{0}' has no files")]
  NoFiles(String),

  #[error("failed to read archive {path}: {message}")]
  Archive { path: PathBuf, message: String },

  #[error("registry error: {0}")]
  Registry(#[from] ApiError),

  #[error(transparent)]
  Files(#[from] FilesError),

  #[error(transparent)]
  Hash(HashError),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// Where a source is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
  Local(PathBuf),
  Http(String),
}

/// Classify a source path.
///
/// Git references fail fast; local paths must exist.
pub fn classify(path: &str) -> Result<SourceKind, SourceError> {
  if path.starts_with("git+") || path.starts_with("git://") || path.starts_with("ssh://") || path.ends_with(".git") {
    return Err(SourceError::UnsupportedGit(path.to_string()));
  }

  if path.starts_with("http://") || path.starts_with("https://") {
    return Ok(SourceKind::Http(path.to_string()));
  }

  let local = Path::new(path);
  if !local.exists() {
    return Err(SourceError::PathNotFound(local.to_path_buf()));
  }

  Ok(SourceKind::Local(dunce::canonicalize(local)?))
}

/// How a resolved source was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceOrigin {
  /// The registry already stores the archive; nothing was materialized.
  Registry,
  /// The archive was already present in the local cache.
  Cache,
  /// The tree was materialized and archived by this call.
  Fetched,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
  pub name: String,
  pub digest: String,
  /// Path of the cached archive, absent when the registry already has it.
  pub archive: Option<PathBuf>,
  pub origin: SourceOrigin,
}

pub struct SourceResolver {
  cache_dir: PathBuf,
  registry: Option<Arc<dyn RegistryService>>,
}

impl SourceResolver {
  pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
    Self {
      cache_dir: cache_dir.into(),
      registry: None,
    }
  }

  pub fn with_registry(mut self, registry: Arc<dyn RegistryService>) -> Self {
    self.registry = Some(registry);
    self
  }

  pub fn cache_dir(&self) -> &Path {
    &self.cache_dir
  }

  /// Cache location for a source archive: `<cache>/<name>-<digest>.tar.zst`.
  pub fn archive_path(&self, name: &str, digest: &str) -> PathBuf {
    self.cache_dir.join(format!("{}-{}.tar.zst", name, digest))
  }

  pub async fn resolve(&self, source: &ArtifactSource) -> Result<ResolvedSource, SourceError> {
    match classify(&source.path)? {
      SourceKind::Http(url) => self.resolve_http(source, &url).await,
      SourceKind::Local(path) => self.resolve_local(source, &path).await,
    }
  }

  async fn resolve_http(&self, source: &ArtifactSource, url: &str) -> Result<ResolvedSource, SourceError> {
    let declared = source
      .digest
      .as_deref()
      .ok_or_else(|| SourceError::MissingDigest(source.name.clone()))?;

    if let Some(resolved) = self.lookup(&source.name, declared).await? {
      return Ok(resolved);
    }

    let scratch = tempfile::tempdir()?;
    let download = fetch::download(url, &scratch.path().join("download")).await?;
    let tree = scratch.path().join("source");
    archive::unpack_download(&download, &tree)?;

    let files = get_file_paths(&tree, &source.includes, &source.excludes)?;
    self.finish(source, &tree, &files).await
  }

  async fn resolve_local(&self, source: &ArtifactSource, path: &Path) -> Result<ResolvedSource, SourceError> {
    if let Some(declared) = source.digest.as_deref()
      && let Some(resolved) = self.lookup(&source.name, declared).await?
    {
      return Ok(resolved);
    }

    let (root, files) = if path.is_file() {
      let parent = path.parent().unwrap_or(path).to_path_buf();
      (parent, vec![path.to_path_buf()])
    } else {
      let files = get_file_paths(path, &source.includes, &source.excludes)?;
      (path.to_path_buf(), files)
    };

    let scratch = tempfile::tempdir()?;
    let tree = scratch.path().join("source");
    let copied = copy_files(&root, &files, &tree)?;

    self.finish(source, &tree, &copied).await
  }

  /// Hash, verify and archive a materialized tree.
  async fn finish(&self, source: &ArtifactSource, tree: &Path, files: &[PathBuf]) -> Result<ResolvedSource, SourceError> {
    if files.is_empty() {
      return Err(SourceError::NoFiles(source.name.clone()));
    }

    set_timestamps(tree)?;

    let digest = hash_files(files)
      .map_err(|e| match e {
        HashError::NoFiles => SourceError::NoFiles(source.name.clone()),
        other => SourceError::Hash(other),
      })?
      .0;

    if let Some(expected) = source.digest.as_deref()
      && expected != digest
    {
      return Err(SourceError::DigestMismatch {
        name: source.name.clone(),
        expected: expected.to_string(),
        actual: digest,
      });
    }

    if source.digest.is_none()
      && let Some(resolved) = self.lookup(&source.name, &digest).await?
    {
      return Ok(resolved);
    }

    let archive_path = self.archive_path(&source.name, &digest);
    archive::create_archive(tree, files, &archive_path)?;

    info!(name = %source.name, digest = %digest, files = files.len(), "resolved source");

    Ok(ResolvedSource {
      name: source.name.clone(),
      digest,
      archive: Some(archive_path),
      origin: SourceOrigin::Fetched,
    })
  }

  /// Check the registry, then the local cache, for an archive under `digest`.
  async fn lookup(&self, name: &str, digest: &str) -> Result<Option<ResolvedSource>, SourceError> {
    if let Some(registry) = &self.registry {
      let exists = registry
        .exists(ArchiveExistsRequest {
          digest: digest.to_string(),
          kind: SOURCE_ARCHIVE_KIND.to_string(),
          name: name.to_string(),
        })
        .await?;

      if exists {
        debug!(name, digest, "source archive found in registry");
        return Ok(Some(ResolvedSource {
          name: name.to_string(),
          digest: digest.to_string(),
          archive: None,
          origin: SourceOrigin::Registry,
        }));
      }
    }

    let cached = self.archive_path(name, digest);
    if cached.exists() {
      debug!(name, digest, path = ?cached, "source archive found in cache");
      return Ok(Some(ResolvedSource {
        name: name.to_string(),
        digest: digest.to_string(),
        archive: Some(cached),
        origin: SourceOrigin::Cache,
      }));
    }

    Ok(None)
  }
}

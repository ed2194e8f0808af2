//! File-set helpers: filtered listing, copying and timestamp normalization.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use filetime::FileTime;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum FilesError {
  #[error("failed to walk directory '{path}': {message}")]
  Walk { path: PathBuf, message: String },

  #[error("failed to copy '{from}' to '{to}': {source}")]
  Copy {
    from: PathBuf,
    to: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to set timestamp on '{path}': {source}")]
  Timestamp {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Whether `relative` (a `/`-separated path) matches `pattern`.
///
/// A pattern matches itself and everything beneath it. A trailing `*`
/// matches any suffix.
pub fn matches_pattern(relative: &str, pattern: &str) -> bool {
  let pattern = pattern.trim_start_matches("./").trim_end_matches('/');
  if pattern.is_empty() {
    return false;
  }
  if let Some(prefix) = pattern.strip_suffix('*') {
    return relative.starts_with(prefix);
  }
  relative == pattern || relative.starts_with(&format!("{}/", pattern))
}

fn relative_str(root: &Path, path: &Path) -> String {
  path
    .strip_prefix(root)
    .unwrap_or(path)
    .to_string_lossy()
    .replace('\\', "/")
}

/// List regular files under `root`, sorted by relative path.
///
/// When `includes` is non-empty only matching files are kept; `excludes`
/// is applied afterwards.
pub fn get_file_paths(root: &Path, includes: &[String], excludes: &[String]) -> Result<Vec<PathBuf>, FilesError> {
  let mut files = Vec::new();

  for entry in WalkDir::new(root).sort_by_file_name() {
    let entry = entry.map_err(|e| FilesError::Walk {
      path: root.to_path_buf(),
      message: e.to_string(),
    })?;

    if !entry.file_type().is_file() {
      continue;
    }

    let relative = relative_str(root, entry.path());

    if !includes.is_empty() && !includes.iter().any(|p| matches_pattern(&relative, p)) {
      continue;
    }
    if excludes.iter().any(|p| matches_pattern(&relative, p)) {
      continue;
    }

    files.push(entry.into_path());
  }

  files.sort_by_key(|path| relative_str(root, path));
  Ok(files)
}

/// Copy `files` (absolute, beneath `from_root`) into `to_root`, preserving
/// relative paths. Returns the copied paths in the same order.
pub fn copy_files(from_root: &Path, files: &[PathBuf], to_root: &Path) -> Result<Vec<PathBuf>, FilesError> {
  let mut copied = Vec::with_capacity(files.len());

  for file in files {
    let relative = file.strip_prefix(from_root).unwrap_or(file);
    let dest = to_root.join(relative);
    let copy_err = |source| FilesError::Copy {
      from: file.clone(),
      to: dest.clone(),
      source,
    };

    if let Some(parent) = dest.parent() {
      fs::create_dir_all(parent).map_err(copy_err)?;
    }
    fs::copy(file, &dest).map_err(copy_err)?;
    copied.push(dest);
  }

  Ok(copied)
}

/// Set the modification time of every entry under `root` to the Unix epoch.
pub fn set_timestamps(root: &Path) -> Result<(), FilesError> {
  let epoch = FileTime::from_unix_time(0, 0);

  for entry in WalkDir::new(root).contents_first(true) {
    let entry = entry.map_err(|e| FilesError::Walk {
      path: root.to_path_buf(),
      message: e.to_string(),
    })?;
    if entry.file_type().is_symlink() {
      continue;
    }
    filetime::set_file_mtime(entry.path(), epoch).map_err(|source| FilesError::Timestamp {
      path: entry.path().to_path_buf(),
      source,
    })?;
  }

  Ok(())
}

use std::path::PathBuf;

use crate::consts::APP_NAME;

/// Returns the user's home directory
pub fn home_dir() -> PathBuf {
  std::env::var("HOME")
    .map(PathBuf::from)
    .unwrap_or_else(|_| std::env::temp_dir())
}

/// Returns the directory for cache files
///
/// `VORPAL_CACHE_DIR` takes precedence, then `XDG_CACHE_HOME`, then `~/.cache`.
pub fn cache_dir() -> PathBuf {
  if let Ok(dir) = std::env::var("VORPAL_CACHE_DIR") {
    return PathBuf::from(dir);
  }
  let cache_home = std::env::var("XDG_CACHE_HOME")
    .map(PathBuf::from)
    .unwrap_or_else(|_| home_dir().join(".cache"));
  cache_home.join(APP_NAME)
}

/// Returns the directory holding `<name>-<digest>.tar.zst` source archives
pub fn source_cache_dir() -> PathBuf {
  cache_dir().join("sources")
}

//! HTTP source downloads.

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::util::hash::hash_bytes;

use super::SourceError;

/// Download `url` into `dir`, streaming the body to disk.
///
/// Returns the path of the downloaded file. Integrity is not checked here:
/// the caller hashes the unpacked tree.
pub async fn download(url: &str, dir: &Path) -> Result<PathBuf, SourceError> {
  info!(url = %url, "downloading source");

  fs::create_dir_all(dir).await?;
  let dest_path = dir.join(url_to_filename(url));

  let fetch_err = |message: String| SourceError::Fetch {
    url: url.to_string(),
    message,
  };

  let response = reqwest::get(url).await.map_err(|e| fetch_err(e.to_string()))?;

  if !response.status().is_success() {
    return Err(fetch_err(format!("HTTP {}", response.status())));
  }

  let mut file = fs::File::create(&dest_path).await?;
  let mut body = response.bytes_stream();
  let mut size = 0usize;

  while let Some(chunk) = body.next().await {
    let chunk = chunk.map_err(|e| fetch_err(e.to_string()))?;
    size += chunk.len();
    file.write_all(&chunk).await?;
  }
  file.flush().await?;

  debug!(path = ?dest_path, size, "download complete");

  Ok(dest_path)
}

/// Convert a URL to a safe filename.
///
/// Uses the last path segment without its query string, falling back to a
/// hash of the URL.
fn url_to_filename(url: &str) -> String {
  let last = url.rsplit('/').next().unwrap_or_default();
  let last = last.split('?').next().unwrap_or(last);

  let sanitized: String = last
    .chars()
    .map(|c| {
      if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
        c
      } else {
        '_'
      }
    })
    .collect();

  if !sanitized.is_empty() && sanitized != "." && sanitized != ".." {
    return sanitized;
  }

  format!("download_{}", &hash_bytes(url.as_bytes()).0[..16])
}

//! Archive handling for sources.
//!
//! Downloads are classified by their leading bytes, never by file name, and
//! decoded through the matching codec into a tar extractor. Resolved trees
//! are cached as deterministic tar+zstd archives.

use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use tar::{Archive, Builder, EntryType, Header};
use tracing::debug;
use xz2::read::XzDecoder;

use super::SourceError;

/// Number of leading bytes needed to recognise every supported format.
const SNIFF_LEN: usize = 512;

const ZSTD_LEVEL: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
  Gzip,
  Bzip2,
  Xz,
  Zip,
  Tar,
}

/// Identify a download by its signature.
pub fn sniff(header: &[u8]) -> Option<ContentType> {
  if header.starts_with(&[0x1f, 0x8b]) {
    return Some(ContentType::Gzip);
  }
  if header.starts_with(b"BZh") {
    return Some(ContentType::Bzip2);
  }
  if header.starts_with(&[0xfd, b'7', b'z', b'X', b'Z', 0x00]) {
    return Some(ContentType::Xz);
  }
  if header.starts_with(b"PK\x03\x04") {
    return Some(ContentType::Zip);
  }
  if header.len() >= 262 && &header[257..262] == b"ustar" {
    return Some(ContentType::Tar);
  }
  None
}

fn sniff_file(path: &Path) -> Result<Option<ContentType>, SourceError> {
  let mut header = Vec::with_capacity(SNIFF_LEN);
  File::open(path)?.take(SNIFF_LEN as u64).read_to_end(&mut header)?;
  Ok(sniff(&header))
}

/// Extract a downloaded archive into `dest`.
pub fn unpack_download(path: &Path, dest: &Path) -> Result<ContentType, SourceError> {
  let content_type = sniff_file(path)?.ok_or_else(|| SourceError::UnsupportedContentType(path.to_path_buf()))?;

  debug!(path = ?path, content_type = ?content_type, "unpacking download");
  fs::create_dir_all(dest)?;

  let reader = BufReader::new(File::open(path)?);
  match content_type {
    ContentType::Gzip => unpack_tar(GzDecoder::new(reader), dest)?,
    ContentType::Bzip2 => unpack_tar(BzDecoder::new(reader), dest)?,
    ContentType::Xz => unpack_tar(XzDecoder::new(reader), dest)?,
    ContentType::Tar => unpack_tar(reader, dest)?,
    ContentType::Zip => unpack_zip(path, dest)?,
  }

  Ok(content_type)
}

fn unpack_tar<R: Read>(reader: R, dest: &Path) -> Result<(), SourceError> {
  let mut archive = Archive::new(reader);
  archive.set_preserve_mtime(false);
  archive.unpack(dest)?;
  Ok(())
}

fn unpack_zip(path: &Path, dest: &Path) -> Result<(), SourceError> {
  let file = BufReader::new(File::open(path)?);
  let mut archive = zip::ZipArchive::new(file).map_err(|e| SourceError::Archive {
    path: path.to_path_buf(),
    message: e.to_string(),
  })?;
  archive.extract(dest).map_err(|e| SourceError::Archive {
    path: path.to_path_buf(),
    message: e.to_string(),
  })?;
  Ok(())
}

#[cfg(unix)]
fn file_mode(metadata: &fs::Metadata) -> u32 {
  use std::os::unix::fs::PermissionsExt;
  if metadata.permissions().mode() & 0o111 != 0 { 0o755 } else { 0o644 }
}

#[cfg(not(unix))]
fn file_mode(_metadata: &fs::Metadata) -> u32 {
  0o644
}

/// Write `files` (beneath `root`) to `dest` as a tar+zstd archive.
///
/// Entries carry relative paths, zero mtimes and zero ownership so equal
/// trees produce equal archives. The archive is written to a temporary file
/// and moved into place, so a failed write never leaves a partial entry.
pub fn create_archive(root: &Path, files: &[PathBuf], dest: &Path) -> Result<(), SourceError> {
  let parent = dest.parent().unwrap_or_else(|| Path::new("."));
  fs::create_dir_all(parent)?;

  let temp = tempfile::NamedTempFile::new_in(parent)?;
  let encoder = zstd::stream::write::Encoder::new(temp.reopen()?, ZSTD_LEVEL)?;
  let mut builder = Builder::new(encoder);

  for file in files {
    let relative = file.strip_prefix(root).unwrap_or(file);
    let metadata = fs::metadata(file)?;

    let mut header = Header::new_gnu();
    header.set_entry_type(EntryType::Regular);
    header.set_size(metadata.len());
    header.set_mode(file_mode(&metadata));
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);

    builder.append_data(&mut header, relative, File::open(file)?)?;
  }

  let encoder = builder.into_inner()?;
  encoder.finish()?;

  temp.persist(dest).map_err(|e| SourceError::Io(e.error))?;

  debug!(path = ?dest, files = files.len(), "wrote source archive");
  Ok(())
}

/// Restore a tar+zstd archive written by [`create_archive`].
pub fn unpack_archive(archive: &Path, dest: &Path) -> Result<(), SourceError> {
  fs::create_dir_all(dest)?;
  let decoder = zstd::stream::read::Decoder::new(File::open(archive)?)?;
  unpack_tar(decoder, dest)
}

// ABOUTME: Packs directories into gzip-compressed tarballs and extracts them again
// ABOUTME: Used for packaged directory arguments; work runs on the blocking thread pool

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;
use walkdir::WalkDir;

use super::error::{Result, StateError};

/// Archive the contents of `dir`. Entry paths are relative to `dir` and
/// symlinks are stored as links.
pub async fn pack(dir: &Path) -> Result<Vec<u8>> {
    let dir = dir.to_path_buf();
    tokio::task::spawn_blocking(move || pack_blocking(&dir))
        .await
        .map_err(|e| StateError::Archive(e.to_string()))?
}

/// Extract an archive produced by [`pack`] into `dest`, creating it if needed.
pub async fn unpack(data: Vec<u8>, dest: &Path) -> Result<()> {
    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || unpack_blocking(&data, &dest))
        .await
        .map_err(|e| StateError::Archive(e.to_string()))?
}

/// A fresh, not yet existing directory under the system temp dir.
pub fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join(format!("trellis-{}", Uuid::new_v4()))
}

fn pack_blocking(dir: &Path) -> Result<Vec<u8>> {
    if !dir.is_dir() {
        return Err(StateError::Archive(format!(
            "{} is not a directory",
            dir.display()
        )));
    }

    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    builder.follow_symlinks(false);

    let mut files = 0usize;
    for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| StateError::Archive(e.to_string()))?;
        let relative = entry
            .path()
            .strip_prefix(dir)
            .map_err(|e| StateError::Archive(e.to_string()))?;
        if relative.as_os_str().is_empty() {
            continue;
        }

        builder.append_path_with_name(entry.path(), relative)?;
        if entry.file_type().is_file() {
            files += 1;
        }
    }

    let data = builder.into_inner()?.finish()?;
    debug!(path = %dir.display(), files, bytes = data.len(), "Packed directory");
    Ok(data)
}

fn unpack_blocking(data: &[u8], dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest)?;
    let mut archive = tar::Archive::new(GzDecoder::new(data));
    archive.set_preserve_permissions(true);
    archive.unpack(dest)?;
    debug!(path = %dest.display(), bytes = data.len(), "Unpacked directory");
    Ok(())
}

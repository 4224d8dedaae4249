// ABOUTME: Resolves state URIs such as file:///tmp/state.json into state handlers
// ABOUTME: Supports filesystem, in-memory and local object storage backends

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use url::Url;

use super::error::{Result, StateError};
use super::filesystem::FilesystemState;
use super::handler::StateHandler;
use super::memory::MemoryState;
use super::object::{LocalObjectStore, ObjectStorageState};

/// Open the state handler named by `uri`.
///
/// * `file:///abs/state.json` or a bare path: [`FilesystemState`]
/// * `memory://`: [`MemoryState`]
/// * `blob+file:///abs/bucket?prefix=p`: [`ObjectStorageState`] over a
///   [`LocalObjectStore`] rooted at the bucket's parent directory
///
/// `s3://` and `gs://` need a client for the service; build an
/// [`ObjectStorageState`] around your own [`ObjectStore`](super::ObjectStore).
pub fn open(uri: &str) -> Result<Arc<dyn StateHandler>> {
    if !uri.contains("://") {
        debug!(path = uri, "Opening filesystem state");
        return Ok(Arc::new(FilesystemState::new(uri)));
    }

    let url = Url::parse(uri)?;
    match url.scheme() {
        "file" => {
            let path = file_path(&url)?;
            debug!(path = %path.display(), "Opening filesystem state");
            Ok(Arc::new(FilesystemState::new(path)))
        }
        "memory" => Ok(Arc::new(MemoryState::new())),
        "blob+file" => {
            let path = file_path(&url)?;
            let bucket = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .ok_or_else(|| invalid(uri, "missing bucket directory"))?;
            let root = path.parent().unwrap_or_else(|| Path::new("/")).to_path_buf();
            let prefix = url
                .query_pairs()
                .find(|(key, _)| key == "prefix")
                .map(|(_, value)| value.into_owned())
                .unwrap_or_default();

            debug!(root = %root.display(), bucket = %bucket, prefix = %prefix, "Opening object storage state");
            Ok(Arc::new(ObjectStorageState::new(
                Arc::new(LocalObjectStore::new(root)),
                bucket,
                prefix,
            )))
        }
        scheme => Err(StateError::UnsupportedScheme {
            scheme: scheme.to_string(),
        }),
    }
}

fn file_path(url: &Url) -> Result<PathBuf> {
    if url.scheme() == "file" {
        return url
            .to_file_path()
            .map_err(|_| invalid(url.as_str(), "not an absolute local path"));
    }

    let path = url.path();
    if !path.starts_with('/') {
        return Err(invalid(url.as_str(), "not an absolute local path"));
    }
    Ok(PathBuf::from(path))
}

fn invalid(uri: &str, reason: &str) -> StateError {
    StateError::InvalidValue {
        key: uri.to_string(),
        reason: reason.to_string(),
    }
}

// ABOUTME: State backend storing every value in one JSON document on disk
// ABOUTME: Packaged directories are kept as tarballs next to the document

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

use super::error::{Result, StateError};
use super::handler::{StateReader, StateWriter};
use super::value::{StateValue, StoredValue};
use crate::pipeline::Argument;

type Document = BTreeMap<String, StoredValue>;

/// Document layout: `{ "<slug>": {"argument": {...}, "value": ...} }`.
#[derive(Debug)]
pub struct FilesystemState {
    path: PathBuf,
    // Serializes read-modify-write cycles on the document.
    lock: Mutex<()>,
}

impl FilesystemState {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    fn archive_path(&self, argument: &Argument) -> PathBuf {
        self.dir().join(format!("{}.tar.gz", argument.slug()))
    }

    async fn load(&self) -> Result<Option<Document>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(None),
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Fail if the slug of `argument` already holds a different key.
    fn check_slug(document: &Document, argument: &Argument) -> Result<()> {
        match document.get(&argument.slug()) {
            Some(stored) if !stored.is_for(argument) => Err(StateError::KeyExists {
                key: argument.key.clone(),
            }),
            _ => Ok(()),
        }
    }

    async fn save(&self, document: &Document) -> Result<()> {
        let data = serde_json::to_vec_pretty(document)?;
        write_atomic(&self.path, &data).await
    }
}

#[async_trait]
impl StateReader for FilesystemState {
    async fn read(&self, argument: &Argument) -> Result<StateValue> {
        let document = self.load().await?.ok_or(StateError::EmptyState)?;
        let stored = document
            .get(&argument.slug())
            .ok_or_else(|| StateError::not_found(&argument.key))?;
        stored.decode(argument)
    }

    async fn exists(&self, argument: &Argument) -> Result<bool> {
        Ok(self
            .load()
            .await?
            .and_then(|document| document.get(&argument.slug()).map(|s| s.is_for(argument)))
            .unwrap_or(false))
    }

    async fn read_archive(&self, argument: &Argument) -> Result<Vec<u8>> {
        match tokio::fs::read(self.archive_path(argument)).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StateError::not_found(&argument.key))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl StateWriter for FilesystemState {
    async fn write(&self, argument: &Argument, value: StateValue) -> Result<()> {
        let entry = StoredValue::new(argument, &value)?;

        let _guard = self.lock.lock().await;
        let mut document = self.load().await?.unwrap_or_default();
        Self::check_slug(&document, argument)?;
        document.insert(argument.slug(), entry);
        self.save(&document).await?;

        debug!(argument = %argument, path = %self.path.display(), "Stored value");
        Ok(())
    }

    async fn write_archive(&self, argument: &Argument, data: Vec<u8>) -> Result<()> {
        let path = self.archive_path(argument);
        let _guard = self.lock.lock().await;
        if let Some(document) = self.load().await? {
            Self::check_slug(&document, argument)?;
        }
        write_atomic(&path, &data).await?;
        debug!(argument = %argument, path = %path.display(), bytes = data.len(), "Stored archive");
        Ok(())
    }
}

/// Write to a sibling temp file and rename over `path`, so readers never see
/// a partially written file.
pub(crate) async fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(format!(".{}.tmp", uuid::Uuid::new_v4()));
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, data).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

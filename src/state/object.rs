// ABOUTME: State backend storing one blob per argument in an object store
// ABOUTME: S3, GCS and local-directory stores share it through the ObjectStore trait

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use super::error::{Result, StateError};
use super::filesystem::write_atomic;
use super::handler::{StateReader, StateWriter};
use super::value::{StateValue, StoredValue};
use crate::pipeline::Argument;

/// Minimal blob API a storage service has to offer.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// `Ok(None)` when the object does not exist.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>>;

    async fn put_object(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<()>;
}

/// Object store backed by a local directory: `<root>/<bucket>/<key>`.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        if key.split('/').any(|part| part == "..") || bucket.contains('/') {
            return Err(StateError::Object(format!(
                "invalid object location {bucket}/{key}"
            )));
        }
        Ok(self.root.join(bucket).join(key))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.object_path(bucket, key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put_object(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<()> {
        let path = self.object_path(bucket, key)?;
        write_atomic(&path, &data).await
    }
}

/// Values live at `<prefix>/<slug>.json`, packaged directories at
/// `<prefix>/<slug>.tar.gz`. Every argument is its own object, so concurrent
/// writers never contend on a shared document.
pub struct ObjectStorageState {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    prefix: String,
}

impl ObjectStorageState {
    /// Fail if the slug of `argument` already holds a different key.
    async fn check_slug(&self, argument: &Argument) -> Result<()> {
        let key = self.key(argument, "json");
        if let Some(data) = self.store.get_object(&self.bucket, &key).await? {
            let stored: StoredValue = serde_json::from_slice(&data)?;
            if !stored.is_for(argument) {
                return Err(StateError::KeyExists {
                    key: argument.key.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            prefix: prefix.into().trim_matches('/').to_string(),
        }
    }

    fn key(&self, argument: &Argument, extension: &str) -> String {
        if self.prefix.is_empty() {
            format!("{}.{}", argument.slug(), extension)
        } else {
            format!("{}/{}.{}", self.prefix, argument.slug(), extension)
        }
    }
}

#[async_trait]
impl StateReader for ObjectStorageState {
    async fn read(&self, argument: &Argument) -> Result<StateValue> {
        let key = self.key(argument, "json");
        let data = self
            .store
            .get_object(&self.bucket, &key)
            .await?
            .ok_or_else(|| StateError::not_found(&argument.key))?;

        let stored: StoredValue = serde_json::from_slice(&data)?;
        stored.decode(argument)
    }

    async fn exists(&self, argument: &Argument) -> Result<bool> {
        let key = self.key(argument, "json");
        match self.store.get_object(&self.bucket, &key).await? {
            Some(data) => Ok(serde_json::from_slice::<StoredValue>(&data)?.is_for(argument)),
            None => Ok(false),
        }
    }

    async fn read_archive(&self, argument: &Argument) -> Result<Vec<u8>> {
        let key = self.key(argument, "tar.gz");
        self.store
            .get_object(&self.bucket, &key)
            .await?
            .ok_or_else(|| StateError::not_found(&argument.key))
    }
}

#[async_trait]
impl StateWriter for ObjectStorageState {
    async fn write(&self, argument: &Argument, value: StateValue) -> Result<()> {
        let key = self.key(argument, "json");
        let data = serde_json::to_vec(&StoredValue::new(argument, &value)?)?;
        self.check_slug(argument).await?;
        self.store.put_object(&self.bucket, &key, data).await?;
        debug!(argument = %argument, bucket = %self.bucket, key = %key, "Stored object");
        Ok(())
    }

    async fn write_archive(&self, argument: &Argument, data: Vec<u8>) -> Result<()> {
        self.check_slug(argument).await?;
        let key = self.key(argument, "tar.gz");
        self.store.put_object(&self.bucket, &key, data).await
    }
}

// ABOUTME: Process-local state backend kept entirely in memory
// ABOUTME: Handy for tests and single-process runs where nothing needs to persist

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::error::{Result, StateError};
use super::handler::{StateReader, StateWriter};
use super::value::StateValue;
use crate::pipeline::Argument;

#[derive(Debug, Default)]
pub struct MemoryState {
    values: RwLock<HashMap<Argument, StateValue>>,
    archives: RwLock<HashMap<Argument, Vec<u8>>>,
}

impl MemoryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.values.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.values.read().await.is_empty()
    }
}

#[async_trait]
impl StateReader for MemoryState {
    async fn read(&self, argument: &Argument) -> Result<StateValue> {
        self.values
            .read()
            .await
            .get(argument)
            .cloned()
            .ok_or_else(|| StateError::not_found(&argument.key))
    }

    async fn exists(&self, argument: &Argument) -> Result<bool> {
        Ok(self.values.read().await.contains_key(argument))
    }

    async fn read_archive(&self, argument: &Argument) -> Result<Vec<u8>> {
        self.archives
            .read()
            .await
            .get(argument)
            .cloned()
            .ok_or_else(|| StateError::not_found(&argument.key))
    }
}

#[async_trait]
impl StateWriter for MemoryState {
    async fn write(&self, argument: &Argument, value: StateValue) -> Result<()> {
        self.values.write().await.insert(argument.clone(), value);
        Ok(())
    }

    async fn write_archive(&self, argument: &Argument, data: Vec<u8>) -> Result<()> {
        self.archives.write().await.insert(argument.clone(), data);
        Ok(())
    }
}

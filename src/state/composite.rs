// ABOUTME: Composite state: a primary handler backed by an ordered chain of fallback readers
// ABOUTME: Values found in a fallback are written back into the primary handler

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use super::error::Result;
use super::handler::{StateHandler, StateReader, StateWriter};
use super::value::StateValue;
use crate::pipeline::Argument;

/// Reads try the primary handler first, then each fallback in order. The
/// first fallback hit is cached into the primary handler before it is
/// returned, so later reads never consult the fallbacks again.
#[derive(Clone)]
pub struct State {
    handler: Arc<dyn StateHandler>,
    fallback: Vec<Arc<dyn StateReader>>,
}

impl State {
    pub fn new(handler: Arc<dyn StateHandler>) -> Self {
        Self {
            handler,
            fallback: Vec::new(),
        }
    }

    pub fn with_fallback(mut self, reader: Arc<dyn StateReader>) -> Self {
        self.fallback.push(reader);
        self
    }

    pub fn handler(&self) -> &Arc<dyn StateHandler> {
        &self.handler
    }
}

#[async_trait]
impl StateReader for State {
    async fn read(&self, argument: &Argument) -> Result<StateValue> {
        let mut last = match self.handler.read(argument).await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        for (position, reader) in self.fallback.iter().enumerate() {
            debug!(argument = %argument, fallback = position, error = %last, "Trying fallback reader");
            match reader.read(argument).await {
                Ok(value) => {
                    self.handler.write(argument, value.clone()).await?;
                    debug!(argument = %argument, fallback = position, "Cached fallback value");
                    return Ok(value);
                }
                Err(e) => last = e,
            }
        }

        Err(last)
    }

    async fn exists(&self, argument: &Argument) -> Result<bool> {
        if self.handler.exists(argument).await? {
            return Ok(true);
        }
        for reader in &self.fallback {
            if reader.exists(argument).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn read_archive(&self, argument: &Argument) -> Result<Vec<u8>> {
        self.handler.read_archive(argument).await
    }

    async fn get_directory(&self, argument: &Argument) -> Result<PathBuf> {
        let mut last = match self.handler.get_directory(argument).await {
            Ok(path) => return Ok(path),
            Err(e) => e,
        };

        for (position, reader) in self.fallback.iter().enumerate() {
            debug!(argument = %argument, fallback = position, error = %last, "Trying fallback reader");
            match reader.get_directory(argument).await {
                Ok(path) => {
                    // Store through the primary so packaged directories get
                    // archived, then hand out the primary's copy.
                    self.handler.set_directory(argument, &path).await?;
                    return self.handler.get_directory(argument).await;
                }
                Err(e) => last = e,
            }
        }

        Err(last)
    }
}

#[async_trait]
impl StateWriter for State {
    async fn write(&self, argument: &Argument, value: StateValue) -> Result<()> {
        self.handler.write(argument, value).await
    }

    async fn write_archive(&self, argument: &Argument, data: Vec<u8>) -> Result<()> {
        self.handler.write_archive(argument, data).await
    }
}

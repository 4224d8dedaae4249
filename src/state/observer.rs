// ABOUTME: State decorator that lets consumers wait until an argument has been written
// ABOUTME: Escape hatch for producer/consumer patterns the static graph cannot express

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tracing::debug;

use super::error::Result;
use super::handler::{StateHandler, StateReader, StateWriter};
use super::value::StateValue;
use crate::pipeline::Argument;

pub struct Observer {
    inner: Arc<dyn StateHandler>,
    waiters: Mutex<HashMap<Argument, Arc<Notify>>>,
}

impl Observer {
    pub fn new(inner: Arc<dyn StateHandler>) -> Self {
        Self {
            inner,
            waiters: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve once `argument` exists in the wrapped handler.
    pub async fn wait(&self, argument: &Argument) -> Result<()> {
        let notify = self.notify_for(argument);
        loop {
            // Register before checking so a write in between is not missed.
            let notified = notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.inner.exists(argument).await? {
                return Ok(());
            }
            debug!(argument = %argument, "Waiting for value");
            notified.await;
        }
    }

    fn notify_for(&self, argument: &Argument) -> Arc<Notify> {
        let mut waiters = match self.waiters.lock() {
            Ok(waiters) => waiters,
            Err(poisoned) => poisoned.into_inner(),
        };
        waiters
            .entry(argument.clone())
            .or_insert_with(|| Arc::new(Notify::new()))
            .clone()
    }

    fn broadcast(&self, argument: &Argument) {
        self.notify_for(argument).notify_waiters();
    }
}

#[async_trait]
impl StateReader for Observer {
    async fn read(&self, argument: &Argument) -> Result<StateValue> {
        self.inner.read(argument).await
    }

    async fn exists(&self, argument: &Argument) -> Result<bool> {
        self.inner.exists(argument).await
    }

    async fn read_archive(&self, argument: &Argument) -> Result<Vec<u8>> {
        self.inner.read_archive(argument).await
    }

    async fn get_directory(&self, argument: &Argument) -> Result<PathBuf> {
        self.inner.get_directory(argument).await
    }
}

#[async_trait]
impl StateWriter for Observer {
    async fn write(&self, argument: &Argument, value: StateValue) -> Result<()> {
        self.inner.write(argument, value).await?;
        self.broadcast(argument);
        Ok(())
    }

    async fn write_archive(&self, argument: &Argument, data: Vec<u8>) -> Result<()> {
        self.inner.write_archive(argument, data).await
    }
}

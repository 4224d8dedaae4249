// ABOUTME: Client trait: the backend that decides how a built collection is executed
// ABOUTME: Clients validate steps up front and then consume the collection's batches

use async_trait::async_trait;

use super::error::Result;
use crate::pipeline::{known, Argument, Collection, Step};

#[async_trait]
pub trait Client: Send + Sync {
    /// Reject steps this client cannot run. Called for every step before
    /// anything executes.
    fn validate(&self, step: &Step) -> Result<()> {
        let _ = step;
        Ok(())
    }

    /// Arguments the client makes available before any step runs.
    fn root_args(&self) -> Vec<Argument> {
        known::defaults()
    }

    /// Execute (or render) the fully built collection.
    async fn done(&self, collection: &Collection) -> anyhow::Result<()>;
}

// ABOUTME: Walker trait handing clients pipelines and steps in ordered execution batches
// ABOUTME: Implemented by Collection; each callback must finish before the next batch is offered

use async_trait::async_trait;
use std::future::Future;
use tracing::debug;

use super::collection::Collection;
use super::pipeline::Pipeline;
use super::step::Step;

#[async_trait]
pub trait Walker: Send + Sync {
    /// Call `f` once per batch of pipelines that may run concurrently.
    async fn walk_pipelines<F, Fut>(&self, f: F) -> anyhow::Result<()>
    where
        F: FnMut(Vec<Pipeline>) -> Fut + Send,
        Fut: Future<Output = anyhow::Result<()>> + Send;

    /// Call `f` once per batch of steps of one pipeline.
    async fn walk_steps<F, Fut>(&self, pipeline_id: i64, f: F) -> anyhow::Result<()>
    where
        F: FnMut(Vec<Step>) -> Fut + Send,
        Fut: Future<Output = anyhow::Result<()>> + Send;
}

#[async_trait]
impl Walker for Collection {
    async fn walk_pipelines<F, Fut>(&self, mut f: F) -> anyhow::Result<()>
    where
        F: FnMut(Vec<Pipeline>) -> Fut + Send,
        Fut: Future<Output = anyhow::Result<()>> + Send,
    {
        let batches = self.pipeline_batches()?;
        for (batch, ids) in batches.into_iter().enumerate() {
            let pipelines = ids
                .into_iter()
                .map(|id| self.pipeline(id).cloned())
                .collect::<Result<Vec<_>, _>>()?;
            debug!(batch = batch + 1, pipelines = pipelines.len(), "Walking pipeline batch");
            f(pipelines).await?;
        }
        Ok(())
    }

    async fn walk_steps<F, Fut>(&self, pipeline_id: i64, f: F) -> anyhow::Result<()>
    where
        F: FnMut(Vec<Step>) -> Fut + Send,
        Fut: Future<Output = anyhow::Result<()>> + Send,
    {
        self.pipeline(pipeline_id)?.walk(f).await
    }
}

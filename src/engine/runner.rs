// ABOUTME: Engine: collects pipelines, builds and validates the graphs, then hands off to a client
// ABOUTME: All structural errors surface here before any action runs

use tracing::{debug, info};

use super::client::Client;
use super::error::Result;
use crate::pipeline::{Collection, Pipeline};

pub struct Engine<C> {
    client: C,
    pipelines: Vec<Pipeline>,
}

impl<C: Client> Engine<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            pipelines: Vec::new(),
        }
    }

    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipelines.push(pipeline);
        self
    }

    pub fn add_pipelines(&mut self, pipelines: impl IntoIterator<Item = Pipeline>) {
        self.pipelines.extend(pipelines);
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Build every step graph and the pipeline graph with the client's root
    /// arguments, then let the client validate each step.
    pub fn build(&self) -> Result<Collection> {
        let mut collection = Collection::new();
        collection.add_pipelines(self.pipelines.iter().cloned())?;
        collection.build(&self.client.root_args())?;

        for pipeline in collection.pipelines() {
            for step in pipeline.steps() {
                self.client.validate(step)?;
            }
            debug!(pipeline = %pipeline.name, steps = pipeline.len(), "Validated pipeline");
        }

        Ok(collection)
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        let collection = self.build()?;
        info!(pipelines = collection.len(), "Built pipeline collection");
        self.client.done(&collection).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{DryRunClient, ExecutionError};
    use crate::pipeline::{Argument, PipelineError, Step};

    #[test]
    fn test_build_fails_fast_on_missing_provider() {
        let mut pipeline = Pipeline::new("build");
        pipeline
            .add_steps([Step::noop("deploy").requires([Argument::string("image")])])
            .unwrap();

        let engine = Engine::new(DryRunClient::new(Vec::new())).with_pipeline(pipeline);
        assert!(matches!(
            engine.build(),
            Err(ExecutionError::Pipeline(PipelineError::NoStepProvider { .. }))
        ));
    }

    #[test]
    fn test_build_runs_client_validation() {
        let mut pipeline = Pipeline::new("build");
        pipeline.add_steps([Step::noop("")]).unwrap();

        let engine = Engine::new(DryRunClient::new(Vec::new())).with_pipeline(pipeline);
        assert!(matches!(
            engine.build(),
            Err(ExecutionError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn test_run_hands_collection_to_client() {
        let mut pipeline = Pipeline::new("build");
        pipeline
            .add_steps([Step::noop("compile").requires([crate::pipeline::known::source()])])
            .unwrap();

        let engine = Engine::new(DryRunClient::new(Vec::new())).with_pipeline(pipeline);
        engine.run().await.unwrap();
    }
}

// ABOUTME: Collection: a dependency graph of pipelines
// ABOUTME: Applies the provider/consumer contract one level up plus explicit pipeline dependencies

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Arc;
use tracing::debug;

use super::argument::Argument;
use super::error::{PipelineError, Result};
use super::pipeline::Pipeline;
use super::provider::ProviderIndex;
use super::step::{Action, Step};
use crate::graph::{Graph, GraphError, ROOT_ID};

#[derive(Debug, Clone, Default)]
pub struct Collection {
    graph: Graph<Pipeline>,
    index: ProviderIndex,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add pipelines to the graph. Pipelines with an ID of `0` get the next free ID.
    pub fn add_pipelines(&mut self, pipelines: impl IntoIterator<Item = Pipeline>) -> Result<()> {
        for mut pipeline in pipelines {
            if pipeline.id == 0 {
                pipeline.id = self.next_id();
            }
            if self.graph.contains(pipeline.id) {
                return Err(GraphError::DuplicateId { id: pipeline.id }.into());
            }

            self.index.register(&pipeline)?;
            debug!(pipeline = %pipeline.name, id = pipeline.id, "Added pipeline");
            self.graph.add_node(pipeline.id, pipeline)?;
        }
        Ok(())
    }

    /// Build the step graph of every pipeline, then the pipeline graph itself.
    pub fn build(&mut self, root_args: &[Argument]) -> Result<()> {
        for node in self.graph.nodes_mut() {
            node.value.build_edges(root_args)?;
        }
        self.build_edges(root_args)
    }

    /// Rebuild the edges between pipelines from their requires/provides and
    /// `depends_on` declarations.
    pub fn build_edges(&mut self, root_args: &[Argument]) -> Result<()> {
        let ids: HashMap<&str, i64> = self
            .pipelines()
            .map(|pipeline| (pipeline.name.as_str(), pipeline.id))
            .collect();

        let mut explicit = Vec::new();
        for pipeline in self.pipelines() {
            for dependency in &pipeline.depends_on {
                let from = ids.get(dependency.as_str()).copied().ok_or_else(|| {
                    PipelineError::UnknownDependency {
                        pipeline: pipeline.name.clone(),
                        dependency: dependency.clone(),
                    }
                })?;
                explicit.push((from, pipeline.id));
            }
        }

        let edges = self.index.resolve(
            self.pipelines(),
            root_args,
            &explicit,
            |pipeline, argument| PipelineError::NoPipelineProvider {
                pipeline: pipeline.to_string(),
                argument: argument.clone(),
            },
        )?;

        let mut graph = self.graph.clone();
        graph.clear_edges();
        for (from, to) in &edges {
            graph.add_edge(*from, *to)?;
        }
        graph.validate_acyclic()?;
        self.graph = graph;

        debug!(edges = edges.len(), "Built pipeline graph");
        Ok(())
    }

    pub fn graph(&self) -> &Graph<Pipeline> {
        &self.graph
    }

    pub fn providers(&self) -> &HashMap<Argument, i64> {
        self.index.providers()
    }

    pub fn pipeline(&self, id: i64) -> Result<&Pipeline> {
        Ok(self.graph.node(id)?)
    }

    /// First pipeline named `name` in breadth-first order.
    pub fn by_name(&self, name: &str) -> Result<&Pipeline> {
        let mut found = None;
        self.graph
            .breadth_first_search::<PipelineError, _>(ROOT_ID, |node| {
                if node.id != ROOT_ID && node.value.name == name {
                    found = Some(node.id);
                    return Ok(ControlFlow::Break(()));
                }
                Ok(ControlFlow::Continue(()))
            })?;

        match found {
            Some(id) => self.pipeline(id),
            None => Err(PipelineError::UnknownPipeline {
                name: name.to_string(),
            }),
        }
    }

    pub fn pipelines(&self) -> impl Iterator<Item = &Pipeline> {
        self.graph.nodes().map(|node| &node.value)
    }

    pub fn len(&self) -> usize {
        self.graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    /// Pipeline IDs grouped into execution batches, in order.
    pub fn pipeline_batches(&self) -> Result<Vec<Vec<i64>>> {
        Ok(self.graph.batches()?)
    }

    /// Wrap every action of every pipeline, see [`Pipeline::wrap_actions`].
    /// `wrap` also receives the owning pipeline's name.
    pub fn wrap_actions<F>(&mut self, wrap: F)
    where
        F: Fn(&str, &Step, Arc<dyn Action>) -> Arc<dyn Action>,
    {
        for node in self.graph.nodes_mut() {
            let pipeline = node.value.name.clone();
            node.value
                .wrap_actions(|step, action| wrap(&pipeline, step, action));
        }
    }

    fn next_id(&self) -> i64 {
        self.pipelines().map(|pipeline| pipeline.id).max().unwrap_or(0) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Step;

    fn names(collection: &Collection) -> Vec<Vec<String>> {
        collection
            .pipeline_batches()
            .unwrap()
            .into_iter()
            .map(|batch| {
                batch
                    .into_iter()
                    .map(|id| collection.pipeline(id).unwrap().name.clone())
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_data_dependencies_between_pipelines() {
        let bundle = Argument::packaged_dir("bundle");

        let mut build = Pipeline::new("build").provides([bundle.clone()]);
        build
            .add_steps([Step::noop("compile").provides([bundle.clone()])])
            .unwrap();

        let mut deploy = Pipeline::new("deploy").requires([bundle.clone()]);
        deploy
            .add_steps([Step::noop("upload").requires([bundle])])
            .unwrap();

        let mut collection = Collection::new();
        collection.add_pipelines([deploy, build]).unwrap();
        collection.build(&[]).unwrap();

        assert_eq!(names(&collection), vec![vec!["build"], vec!["deploy"]]);
    }

    #[test]
    fn test_explicit_dependencies() {
        let mut collection = Collection::new();
        collection
            .add_pipelines([
                Pipeline::new("lint"),
                Pipeline::new("publish").depends_on("test"),
                Pipeline::new("test").depends_on("lint"),
            ])
            .unwrap();
        collection.build_edges(&[]).unwrap();

        assert_eq!(names(&collection), vec![vec!["lint"], vec!["test"], vec!["publish"]]);
        assert!(!collection.graph().has_edge(ROOT_ID, 2));
    }

    #[test]
    fn test_unknown_dependency() {
        let mut collection = Collection::new();
        collection
            .add_pipelines([Pipeline::new("publish").depends_on("build")])
            .unwrap();

        let err = collection.build_edges(&[]).unwrap_err();
        assert_eq!(
            err,
            PipelineError::UnknownDependency {
                pipeline: "publish".to_string(),
                dependency: "build".to_string(),
            }
        );
    }

    #[test]
    fn test_missing_pipeline_provider() {
        let mut collection = Collection::new();
        collection
            .add_pipelines([Pipeline::new("deploy").requires([Argument::string("image")])])
            .unwrap();

        let err = collection.build_edges(&[]).unwrap_err();
        assert!(matches!(err, PipelineError::NoPipelineProvider { .. }));

        collection.build_edges(&[Argument::string("image")]).unwrap();
        assert!(collection.graph().has_edge(ROOT_ID, 1));

        // Root args from the previous build are not remembered.
        let err = collection.build_edges(&[]).unwrap_err();
        assert!(matches!(err, PipelineError::NoPipelineProvider { .. }));
    }

    #[test]
    fn test_pipeline_cycle_rejected() {
        let mut collection = Collection::new();
        collection
            .add_pipelines([
                Pipeline::new("a").depends_on("b"),
                Pipeline::new("b").depends_on("a"),
            ])
            .unwrap();

        let err = collection.build_edges(&[]).unwrap_err();
        assert!(matches!(err, PipelineError::Graph(GraphError::Cycle { .. })));
    }

    #[test]
    fn test_by_name() {
        let mut collection = Collection::new();
        collection
            .add_pipelines([Pipeline::new("build"), Pipeline::new("test")])
            .unwrap();
        collection.build_edges(&[]).unwrap();

        assert_eq!(collection.by_name("test").unwrap().id, 2);
        assert_eq!(
            collection.by_name("missing").unwrap_err(),
            PipelineError::UnknownPipeline {
                name: "missing".to_string()
            }
        );
    }
}

// ABOUTME: Pipeline: a dependency graph of steps plus its own requires/provides contract
// ABOUTME: Builds step edges from declared arguments and yields steps in execution batches

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

use super::argument::Argument;
use super::error::{PipelineError, Result};
use super::event::Event;
use super::provider::{Dependent, ProviderIndex};
use super::step::{Action, Step};
use crate::graph::Graph;

#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    /// Assigned by the collection when left at `0`.
    pub id: i64,
    pub name: String,
    pub events: Vec<Event>,
    /// Arguments this pipeline expects from upstream pipelines.
    pub requires: Vec<Argument>,
    /// Arguments this pipeline makes available to downstream pipelines.
    pub provides: Vec<Argument>,
    /// Names of pipelines that must finish first even without a data dependency.
    pub depends_on: Vec<String>,
    graph: Graph<Step>,
    index: ProviderIndex,
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }

    pub fn requires(mut self, args: impl IntoIterator<Item = Argument>) -> Self {
        self.requires.extend(args);
        self
    }

    pub fn provides(mut self, args: impl IntoIterator<Item = Argument>) -> Self {
        self.provides.extend(args);
        self
    }

    pub fn depends_on(mut self, pipeline: impl Into<String>) -> Self {
        self.depends_on.push(pipeline.into());
        self
    }

    pub fn on(mut self, event: Event) -> Self {
        self.events.push(event);
        self
    }

    /// Add steps to the graph and register what they provide. Steps with an
    /// ID of `0` get the next free ID.
    pub fn add_steps(&mut self, steps: impl IntoIterator<Item = Step>) -> Result<()> {
        for mut step in steps {
            if step.id == 0 {
                step.id = self.next_id();
            }
            if self.graph.contains(step.id) {
                return Err(crate::graph::GraphError::DuplicateId { id: step.id }.into());
            }

            self.index.register(&step)?;
            debug!(pipeline = %self.name, step = %step.name, id = step.id, "Added step");
            self.graph.add_node(step.id, step)?;
        }
        Ok(())
    }

    /// Rebuild every step edge from the declared arguments.
    ///
    /// `root_args` (and whatever this pipeline's events provide) count as
    /// provided by the root node. Fails on unresolvable requirements and on
    /// cycles; on failure the existing edges are left untouched.
    pub fn build_edges(&mut self, root_args: &[Argument]) -> Result<()> {
        let mut from_root = root_args.to_vec();
        for event in &self.events {
            from_root.extend(event.provides.iter().cloned());
        }
        from_root.extend(self.requires.iter().cloned());

        let edges = self.index.resolve(
            self.graph.nodes().map(|node| &node.value),
            &from_root,
            &[],
            |step, argument| PipelineError::NoStepProvider {
                step: step.to_string(),
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

        debug!(pipeline = %self.name, edges = edges.len(), "Built step graph");
        Ok(())
    }

    pub fn graph(&self) -> &Graph<Step> {
        &self.graph
    }

    pub fn providers(&self) -> &HashMap<Argument, i64> {
        self.index.providers()
    }

    /// IDs of steps with no requirements.
    pub fn root(&self) -> &[i64] {
        self.index.root()
    }

    pub fn step(&self, id: i64) -> Result<&Step> {
        Ok(self.graph.node(id)?)
    }

    pub fn step_by_name(&self, name: &str) -> Option<&Step> {
        self.steps().find(|step| step.name == name)
    }

    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.graph.nodes().map(|node| &node.value)
    }

    pub fn len(&self) -> usize {
        self.graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    /// Steps grouped into execution batches, in order.
    pub fn step_batches(&self) -> Result<Vec<Vec<Step>>> {
        let mut batches = Vec::new();
        for ids in self.graph.batches()? {
            let steps = ids
                .into_iter()
                .map(|id| self.graph.node(id).cloned())
                .collect::<std::result::Result<Vec<_>, _>>()?;
            batches.push(steps);
        }
        Ok(batches)
    }

    /// Replace every action with `wrap(step, action)`.
    pub fn wrap_actions<F>(&mut self, wrap: F)
    where
        F: Fn(&Step, Arc<dyn Action>) -> Arc<dyn Action>,
    {
        for node in self.graph.nodes_mut() {
            if let Some(action) = node.value.action.take() {
                let wrapped = wrap(&node.value, action);
                node.value.action = Some(wrapped);
            }
        }
    }

    /// Call `f` once per step batch; batch N+1 starts only after `f` returned
    /// successfully for batch N.
    pub async fn walk<F, Fut>(&self, mut f: F) -> anyhow::Result<()>
    where
        F: FnMut(Vec<Step>) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        for (batch, steps) in self.step_batches()?.into_iter().enumerate() {
            debug!(pipeline = %self.name, batch = batch + 1, steps = steps.len(), "Walking step batch");
            f(steps).await?;
        }
        Ok(())
    }

    fn next_id(&self) -> i64 {
        self.steps().map(|step| step.id).max().unwrap_or(0) + 1
    }
}

impl Dependent for Step {
    fn id(&self) -> i64 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn requires(&self) -> &[Argument] {
        &self.requires
    }

    fn provides(&self) -> &[Argument] {
        &self.provides
    }

    fn is_background(&self) -> bool {
        Step::is_background(self)
    }
}

impl Dependent for Pipeline {
    fn id(&self) -> i64 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn requires(&self) -> &[Argument] {
        &self.requires
    }

    fn provides(&self) -> &[Argument] {
        &self.provides
    }

    fn has_explicit_dependencies(&self) -> bool {
        !self.depends_on.is_empty()
    }
}

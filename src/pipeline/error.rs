// ABOUTME: Error types for dependency resolution between steps and pipelines
// ABOUTME: Raised while building graphs, before any action is executed

use thiserror::Error;

use super::argument::Argument;
use crate::graph::GraphError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("No step provides argument '{argument}' required by step '{step}'")]
    NoStepProvider { step: String, argument: Argument },

    #[error("No pipeline provides argument '{argument}' required by pipeline '{pipeline}'")]
    NoPipelineProvider { pipeline: String, argument: Argument },

    #[error("Argument '{argument}' is provided by both node {existing} and node {duplicate}")]
    AmbiguousProvider {
        argument: Argument,
        existing: i64,
        duplicate: i64,
    },

    #[error("Pipeline '{pipeline}' depends on unknown pipeline '{dependency}'")]
    UnknownDependency { pipeline: String, dependency: String },

    #[error("Unknown pipeline '{name}'")]
    UnknownPipeline { name: String },

    #[error(transparent)]
    Graph(#[from] GraphError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

// ABOUTME: Error types for running pipelines: action failures, timeouts and validation
// ABOUTME: Wraps graph construction and state errors raised while preparing a run

use std::time::Duration;
use thiserror::Error;

use crate::pipeline::PipelineError;
use crate::state::StateError;

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Step '{name}' failed: {message}")]
    ActionFailed { name: String, message: String },

    #[error("Batch timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Step '{name}' panicked: {message}")]
    ActionPanicked { name: String, message: String },

    #[error("Step '{step}' rejected by client: {reason}")]
    Validation { step: String, reason: String },

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ExecutionError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ExecutionError::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, ExecutionError>;

// ABOUTME: Error types for structural graph operations
// ABOUTME: Covers duplicate node IDs, missing nodes and cycles found before execution

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Node with id {id} already exists")]
    DuplicateId { id: i64 },

    #[error("Node with id {id} not found")]
    NotFound { id: i64 },

    #[error("Cycle detected in graph involving node {id}")]
    Cycle { id: i64 },
}

pub type Result<T> = std::result::Result<T, GraphError>;

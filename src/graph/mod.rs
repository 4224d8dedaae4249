// ABOUTME: Generic directed acyclic graph keyed by integer node IDs
// ABOUTME: Exports the graph type, traversal helpers and graph error types

pub mod dag;
pub mod error;

pub use dag::{Graph, Node, ROOT_ID};
pub use error::{GraphError, Result};

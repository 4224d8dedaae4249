// ABOUTME: Main library module for the trellis pipeline engine
// ABOUTME: Exports the graph, pipeline, state and engine modules and provides the public API

pub mod cli;
pub mod engine;
pub mod graph;
pub mod pipeline;
pub mod state;

// Re-export commonly used types
pub use cli::{App, Args, Config};
pub use engine::{Client, DryRunClient, Engine, LocalClient, LocalOptions, RunReport};
pub use graph::{Graph, GraphError};
pub use pipeline::{Argument, ArgumentType, Collection, Pipeline, Step, Walker};
pub use state::{State, StateHandler, StateReader, StateWriter};

// Error handling
pub type Result<T> = anyhow::Result<T>;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ABOUTME: Pipeline-as-code model: arguments, steps, pipelines and pipeline collections
// ABOUTME: Resolves provides/requires declarations into dependency graphs and walks them in batches

pub mod argument;
pub mod collection;
pub mod error;
pub mod event;
pub mod known;
pub mod pipeline;
pub mod provider;
pub mod step;
pub mod walker;

pub use argument::{slugify, Argument, ArgumentType};
pub use collection::Collection;
pub use error::{PipelineError, Result};
pub use event::{Event, EventKind};
pub use pipeline::Pipeline;
pub use step::{Action, ActionOpts, Step, StepKind};
pub use walker::Walker;

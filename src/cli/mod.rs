// ABOUTME: Command line front end for binaries that define pipelines in code
// ABOUTME: Exports argument parsing, configuration and the application entry point

pub mod app;
pub mod args;
pub mod commands;
pub mod config;

pub use app::App;
pub use args::{Args, Commands, RunArgs};
pub use config::Config;

use crate::pipeline::Pipeline;

/// Parse the process arguments and run or plan `pipelines`.
pub async fn run(pipelines: Vec<Pipeline>) -> anyhow::Result<()> {
    let (app, args) = App::from_args()?;
    app.run(args, pipelines).await
}

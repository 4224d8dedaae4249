// ABOUTME: Command line argument definitions and parsing using Clap
// ABOUTME: Defines the global flags and the run/plan subcommands of a pipeline binary

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "trellis")]
#[command(about = "Run pipeline-as-code builds: typed steps, dependency graphs, batched execution")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(short, long, global = true, help = "Path to configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Disable colored output")]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run pipelines in this process
    Run(RunArgs),

    /// Print the execution plan without running anything
    Plan,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct RunArgs {
    #[arg(long, help = "Only run the pipeline with this name")]
    pub pipeline: Option<String>,

    #[arg(long, help = "Only run steps with this name")]
    pub step: Option<String>,

    #[arg(long, help = "Build identifier (defaults to a random UUID)")]
    pub build_id: Option<String>,

    #[arg(long, help = "State URI, e.g. file:///tmp/build/state.json")]
    pub state: Option<String>,

    #[arg(
        short = 'a',
        long = "arg",
        help = "Pre-supplied argument value (key=value)"
    )]
    pub args: Vec<String>,

    #[arg(long, value_parser = parse_duration, help = "Timeout per step batch, e.g. 30m")]
    pub timeout: Option<Duration>,

    #[arg(long, help = "Maximum number of concurrent steps per batch")]
    pub max_concurrent: Option<usize>,

    #[arg(long, help = "Dry run - print the plan without executing")]
    pub dry_run: bool,

    #[arg(long, help = "Never prompt for missing arguments")]
    pub no_prompt: bool,

    #[arg(long, help = "Write the run report as JSON to this file")]
    pub report: Option<PathBuf>,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

fn parse_duration(value: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(value).map_err(|e| e.to_string())
}

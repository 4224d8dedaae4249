// ABOUTME: Command implementations for pipeline binaries
// ABOUTME: Wires configuration, state and clients together for the run and plan commands

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use super::args::RunArgs;
use super::config::Config;
use crate::engine::{DryRunClient, Engine, LocalClient, LocalOptions, RunReport};
use crate::pipeline::Pipeline;
use crate::state::{self, ArgMap, PromptReader, State};

/// Run pipelines locally
pub async fn run(config: &Config, args: RunArgs, pipelines: Vec<Pipeline>) -> Result<()> {
    if args.dry_run {
        info!("Dry run - printing plan only");
        return plan(pipelines).await;
    }

    let build_id = args
        .build_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let state = build_state(config, &args, &build_id)?;

    let defaults = LocalOptions::default();
    let options = LocalOptions {
        batch_timeout: args.timeout.unwrap_or(config.batch_timeout),
        max_concurrent: args.max_concurrent.or(config.max_concurrent),
        pipeline: args.pipeline.clone(),
        step: args.step.clone(),
        build_id,
        ..defaults
    };

    let mut engine = Engine::new(LocalClient::new(Arc::new(state), options));
    engine.add_pipelines(pipelines);
    let result = engine.run().await;

    if let Some(report) = engine.client().report() {
        print_report(&report);

        if let Some(path) = &args.report {
            let json_content = serde_json::to_string_pretty(&report)
                .map_err(|e| anyhow::anyhow!("Failed to serialize report to JSON: {}", e))?;
            std::fs::write(path, json_content).map_err(|e| {
                anyhow::anyhow!("Failed to write report file '{}': {}", path.display(), e)
            })?;
            info!("Report written to: {}", path.display());
        }
    }

    result
}

/// Print the execution plan
pub async fn plan(pipelines: Vec<Pipeline>) -> Result<()> {
    let mut engine = Engine::new(DryRunClient::stdout());
    engine.add_pipelines(pipelines);
    engine.run().await
}

/// Primary state from the configured URI, backed by `--arg` values and,
/// unless disabled, an interactive prompt.
fn build_state(config: &Config, args: &RunArgs, build_id: &str) -> Result<State> {
    let uri = args
        .state
        .clone()
        .unwrap_or_else(|| config.state_uri(build_id));
    info!("Using state: {}", uri);

    let mut values = ArgMap::parse(&args.args)?;
    values.extend_defaults(config.args.clone());

    let mut state = State::new(state::open(&uri)?).with_fallback(Arc::new(values));
    if !args.no_prompt {
        state = state.with_fallback(Arc::new(PromptReader::stdin()));
    }
    Ok(state)
}

fn print_report(report: &RunReport) {
    println!(
        "Build '{}' completed with status: {}",
        report.build_id, report.status
    );

    for step in &report.steps {
        println!("  {} / {}: {}", step.pipeline, step.step, step.status);
        if let Some(ref error) = step.error {
            println!("    Error: {}", error.trim());
        }
    }
}

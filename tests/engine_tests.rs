// ABOUTME: Integration tests for the execution engine and its clients
// ABOUTME: Tests local runs end to end, selection, failure and timeout handling, background steps and plans

use std::time::Duration;

use trellis::engine::{
    DryRunClient, Engine, ExecutionError, LocalClient, LocalOptions, RunReport, RunStatus,
    StepResult, StepStatus, WaitGroup,
};
use trellis::pipeline::{known, Argument, Step};
use trellis::state::{StateReader, StateWriter};

mod common;
use common::{local_client, memory_state, TestPipelineBuilder};

fn result<'a>(report: &'a RunReport, step: &str) -> &'a StepResult {
    report
        .steps
        .iter()
        .find(|result| result.step == step)
        .unwrap_or_else(|| panic!("no result for step '{step}'"))
}

#[tokio::test]
async fn test_wait_group_all_succeed() {
    let mut group = WaitGroup::new();
    for name in ["one", "two", "three"] {
        group.add(name, async { Ok(()) });
    }
    group.wait(Duration::from_secs(3600)).await.unwrap();
}

#[tokio::test]
async fn test_wait_group_times_out() {
    let mut group = WaitGroup::new();
    group.add("quick", async { Ok(()) });
    group.add("sleeper", async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(())
    });

    let err = group.wait(Duration::from_millis(10)).await.unwrap_err();
    assert!(matches!(err, ExecutionError::Timeout { .. }));
    assert!(err.is_timeout());
}

#[tokio::test]
async fn test_local_run_passes_values_between_steps() {
    let state = memory_state();
    let builder = TestPipelineBuilder::new("build")
        .add_step("version", &[], &["version"])
        .add_step("compile", &["version"], &["binary"])
        .add_step("lint", &[], &[]);
    let log = builder.log();

    let mut engine = Engine::new(local_client(state.clone()));
    engine.add_pipelines([builder.build()]);
    engine.run().await.unwrap();

    let order = log.lock().unwrap().clone();
    let version_at = order.iter().position(|name| name == "version").unwrap();
    let compile_at = order.iter().position(|name| name == "compile").unwrap();
    assert!(version_at < compile_at);
    assert_eq!(order.len(), 3);

    assert_eq!(
        state.get_string(&Argument::string("binary")).await.unwrap(),
        "compile-output"
    );
    assert_eq!(
        state.get_string(&known::build_id()).await.unwrap(),
        "test-build"
    );

    let report = engine.client().report().unwrap();
    assert_eq!(report.status, RunStatus::Success);
    assert_eq!(report.summary.total_steps, 3);
    assert_eq!(report.summary.successful_steps, 3);
}

#[tokio::test]
async fn test_step_selection_skips_other_steps() {
    let state = memory_state();
    let builder = TestPipelineBuilder::new("build")
        .add_step("prepare", &[], &["prepared"])
        .add_step("compile", &["prepared"], &[]);
    let log = builder.log();

    let client = LocalClient::new(
        state,
        LocalOptions {
            step: Some("compile".to_string()),
            ..Default::default()
        },
    );
    let mut engine = Engine::new(client);
    engine.add_pipelines([builder.build()]);
    engine.run().await.unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["compile".to_string()]);
    let report = engine.client().report().unwrap();
    assert_eq!(result(&report, "prepare").status, StepStatus::Skipped);
    assert_eq!(result(&report, "compile").status, StepStatus::Success);
}

#[tokio::test]
async fn test_pipeline_selection_skips_other_pipelines() {
    let state = memory_state();
    let build = TestPipelineBuilder::new("build").add_step("compile", &[], &[]);
    let docs = TestPipelineBuilder::new("docs").add_step("render", &[], &[]);
    let docs_log = docs.log();

    let client = LocalClient::new(
        state.clone(),
        LocalOptions {
            pipeline: Some("build".to_string()),
            ..Default::default()
        },
    );
    let mut engine = Engine::new(client);
    engine.add_pipelines([build.build(), docs.build()]);
    engine.run().await.unwrap();

    assert!(docs_log.lock().unwrap().is_empty());
    let report = engine.client().report().unwrap();
    assert_eq!(result(&report, "render").status, StepStatus::Skipped);
    assert_eq!(
        state.get_string(&known::pipeline_name()).await.unwrap(),
        "build"
    );
}

#[tokio::test]
async fn test_unknown_pipeline_selection_fails_before_running() {
    let builder = TestPipelineBuilder::new("build").add_step("compile", &[], &[]);
    let log = builder.log();

    let client = LocalClient::new(
        memory_state(),
        LocalOptions {
            pipeline: Some("nope".to_string()),
            ..Default::default()
        },
    );
    let mut engine = Engine::new(client);
    engine.add_pipelines([builder.build()]);

    assert!(engine.run().await.is_err());
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_failure_stops_later_batches() {
    let builder = TestPipelineBuilder::new("build")
        .add_step("prepare", &[], &["prepared"])
        .add_failing_step("broken", &[])
        .add_step("package", &["prepared"], &[]);
    let log = builder.log();

    let mut engine = Engine::new(local_client(memory_state()));
    engine.add_pipelines([builder.build()]);

    let err = engine.run().await.unwrap_err();
    assert!(err.to_string().contains("broken"));
    assert!(!log.lock().unwrap().contains(&"package".to_string()));

    let report = engine.client().report().unwrap();
    assert_eq!(report.status, RunStatus::Failed);
    let broken = result(&report, "broken");
    assert_eq!(broken.status, StepStatus::Failed);
    assert!(broken.error.as_deref().unwrap().contains("exit status 1"));
    assert!(report.steps.iter().all(|result| result.step != "package"));
}

#[tokio::test]
async fn test_batch_timeout_marks_step_timed_out() {
    let builder = TestPipelineBuilder::new("build").add_slow_step("hang", Duration::from_secs(5));

    let client = LocalClient::new(
        memory_state(),
        LocalOptions {
            batch_timeout: Duration::from_millis(50),
            ..Default::default()
        },
    );
    let mut engine = Engine::new(client);
    engine.add_pipelines([builder.build()]);

    let started = std::time::Instant::now();
    assert!(engine.run().await.is_err());
    assert!(started.elapsed() < Duration::from_secs(5));

    let report = engine.client().report().unwrap();
    assert_eq!(result(&report, "hang").status, StepStatus::Timeout);
    assert_eq!(report.status, RunStatus::Timeout);
}

#[tokio::test]
async fn test_background_step_is_cancelled_when_pipeline_ends() {
    let state = memory_state();
    let stopped = Argument::boolean("sidecar-stopped");
    let flag = stopped.clone();

    let pipeline = TestPipelineBuilder::new("build")
        .add_step("compile", &[], &[])
        .with_step(
            Step::new("sidecar", move |opts| {
                let flag = flag.clone();
                async move {
                    opts.cancel.cancelled().await;
                    opts.state.set_bool(&flag, true).await?;
                    Ok(())
                }
            })
            .background(),
        )
        .build();

    let mut engine = Engine::new(local_client(state.clone()));
    engine.add_pipelines([pipeline]);
    tokio::time::timeout(Duration::from_secs(5), engine.run())
        .await
        .expect("background step kept the pipeline alive")
        .unwrap();

    assert!(state.get_bool(&stopped).await.unwrap());
    let report = engine.client().report().unwrap();
    assert_eq!(result(&report, "sidecar").status, StepStatus::Success);
    assert_eq!(result(&report, "compile").status, StepStatus::Success);
}

#[tokio::test]
async fn test_dependent_pipeline_reads_upstream_output() {
    let state = memory_state();
    let build = TestPipelineBuilder::new("build")
        .provides(&["artifact"])
        .add_step("compile", &[], &["artifact"]);

    let seen = Argument::string("seen");
    let artifact = Argument::string("artifact");
    let publish = TestPipelineBuilder::new("publish")
        .requires(&["artifact"])
        .with_step(
            Step::new("upload", move |opts| {
                let artifact = artifact.clone();
                let seen = Argument::string("seen");
                async move {
                    let value = opts.state.get_string(&artifact).await?;
                    opts.state.set_string(&seen, &value).await?;
                    Ok(())
                }
            })
            .requires([Argument::string("artifact")])
            .provides([seen.clone()]),
        );

    let mut engine = Engine::new(local_client(state.clone()));
    engine.add_pipelines([publish.build(), build.build()]);
    engine.run().await.unwrap();

    assert_eq!(state.get_string(&seen).await.unwrap(), "compile-output");
}

#[tokio::test]
async fn test_dry_run_prints_plan_without_running() {
    let builder = TestPipelineBuilder::new("build")
        .add_step("prepare", &[], &["prepared"])
        .add_step("compile", &["prepared"], &[]);
    let log = builder.log();

    let mut engine = Engine::new(DryRunClient::new(Vec::new()));
    engine.add_pipelines([builder.build()]);
    engine.run().await.unwrap();

    assert!(log.lock().unwrap().is_empty());
    let collection = engine.build().unwrap();
    let plan = DryRunClient::<Vec<u8>>::render(&collection).unwrap();
    assert!(plan.contains("Pipeline batch 1:"));
    assert!(plan.contains("  build (id 1)"));
    assert!(plan.contains("    Step batch 2:"));
    assert!(plan.contains("      - compile"));
}

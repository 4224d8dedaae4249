// ABOUTME: Client that runs every action in-process, batch by batch
// ABOUTME: Handles background steps, pipeline/step selection and the run report

use async_trait::async_trait;
use futures::future::join_all;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tracing::{error, info, warn};

use super::cancel::{cancellation, Cancellation};
use super::client::Client;
use super::error::ExecutionError;
use super::result::{RunReport, StepResult, StepStatus};
use super::trace::TracedAction;
use super::waitgroup::WaitGroup;
use crate::pipeline::{known, ActionOpts, Argument, Collection, Pipeline, Step, Walker};
use crate::state::{StateHandler, StateWriter};

/// How long background steps get to exit after their pipeline finished.
const BACKGROUND_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct LocalOptions {
    pub batch_timeout: Duration,
    pub max_concurrent: Option<usize>,
    /// Only run the pipeline with this name.
    pub pipeline: Option<String>,
    /// Only run steps with this name.
    pub step: Option<String>,
    pub build_id: String,
    pub source: PathBuf,
    pub workdir: PathBuf,
}

impl Default for LocalOptions {
    fn default() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            batch_timeout: Duration::from_secs(3600),
            max_concurrent: None,
            pipeline: None,
            step: None,
            build_id: uuid::Uuid::new_v4().to_string(),
            source: cwd.clone(),
            workdir: cwd,
        }
    }
}

type SharedReport = Arc<Mutex<RunReport>>;

pub struct LocalClient {
    state: Arc<dyn StateHandler>,
    options: LocalOptions,
    report: Mutex<Option<RunReport>>,
}

impl LocalClient {
    pub fn new(state: Arc<dyn StateHandler>, options: LocalOptions) -> Self {
        Self {
            state,
            options,
            report: Mutex::new(None),
        }
    }

    pub fn options(&self) -> &LocalOptions {
        &self.options
    }

    /// Report of the last finished run.
    pub fn report(&self) -> Option<RunReport> {
        lock(&self.report).clone()
    }

    async fn seed_state(&self) -> crate::state::Result<()> {
        self.state
            .set_directory(&known::source(), &self.options.source)
            .await?;
        self.state
            .set_string(&known::workdir(), &self.options.workdir.to_string_lossy())
            .await?;
        self.state
            .set_string(&known::build_id(), &self.options.build_id)
            .await?;
        if let Some(pipeline) = &self.options.pipeline {
            self.state
                .set_string(&known::pipeline_name(), pipeline)
                .await?;
        }
        Ok(())
    }

    fn pipeline_selected(&self, pipeline: &Pipeline) -> bool {
        self.options
            .pipeline
            .as_deref()
            .map_or(true, |name| name == pipeline.name)
    }

    fn step_selected(&self, step: &Step) -> bool {
        self.options
            .step
            .as_deref()
            .map_or(true, |name| name == step.name)
    }

    async fn run_pipelines(
        &self,
        collection: &Collection,
        pipelines: Vec<Pipeline>,
        report: &SharedReport,
    ) -> anyhow::Result<()> {
        let mut runs = Vec::new();
        for pipeline in &pipelines {
            if self.pipeline_selected(pipeline) {
                runs.push(self.run_pipeline(collection, pipeline, report));
            } else {
                info!(pipeline = %pipeline.name, "Skipping unselected pipeline");
                let mut report = lock(report);
                for step in pipeline.steps() {
                    report.record(StepResult::skipped(&pipeline.name, step));
                }
            }
        }

        for result in join_all(runs).await {
            result?;
        }
        Ok(())
    }

    async fn run_pipeline(
        &self,
        collection: &Collection,
        pipeline: &Pipeline,
        report: &SharedReport,
    ) -> anyhow::Result<()> {
        info!(pipeline = %pipeline.name, steps = pipeline.len(), "Running pipeline");

        let (handle, token) = cancellation();
        let mut background = JoinSet::new();
        for step in pipeline.steps().filter(|step| step.is_background()) {
            if !self.step_selected(step) {
                lock(report).record(StepResult::skipped(&pipeline.name, step));
                continue;
            }
            info!(pipeline = %pipeline.name, step = %step.name, "Starting background step");
            let run = self.start_step(&pipeline.name, step.clone(), token.clone(), report.clone());
            background.spawn(run);
        }

        let this = self;
        let name = pipeline.name.as_str();
        let result = collection
            .walk_steps(pipeline.id, move |steps| this.run_batch(name, steps, report))
            .await;

        handle.cancel();
        let deadline = Instant::now() + BACKGROUND_GRACE;
        while let Ok(Some(_)) = timeout_at(deadline, background.join_next()).await {}
        if !background.is_empty() {
            warn!(pipeline = %pipeline.name, remaining = background.len(), "Aborting background steps");
            background.abort_all();
        }

        match &result {
            Ok(()) => info!(pipeline = %pipeline.name, "Pipeline finished"),
            Err(e) => error!(pipeline = %pipeline.name, error = %e, "Pipeline failed"),
        }
        result
    }

    async fn run_batch(
        &self,
        pipeline: &str,
        steps: Vec<Step>,
        report: &SharedReport,
    ) -> anyhow::Result<()> {
        let mut group = match self.options.max_concurrent {
            Some(limit) => WaitGroup::with_limit(limit),
            None => WaitGroup::new(),
        };
        let token = group.cancellation();

        let mut started = Vec::new();
        for step in steps {
            if step.is_background() {
                continue;
            }
            if !self.step_selected(&step) {
                lock(report).record(StepResult::skipped(pipeline, &step));
                continue;
            }
            started.push(step.clone());
            let name = step.name.clone();
            group.add(name, self.start_step(pipeline, step, token.clone(), report.clone()));
        }

        if group.is_empty() {
            return Ok(());
        }

        info!(pipeline = %pipeline, steps = group.len(), "Running step batch");
        let result = group.wait(self.options.batch_timeout).await;

        if let Err(e) = &result {
            let status = if e.is_timeout() {
                StepStatus::Timeout
            } else {
                StepStatus::Cancelled
            };
            let mut report = lock(report);
            for step in &started {
                let mut abandoned = StepResult::started(pipeline, step);
                abandoned.mark_completed(status, Some(e.to_string()));
                report.record(abandoned);
            }
        }

        Ok(result?)
    }

    /// Future running one step and recording its result.
    fn start_step(
        &self,
        pipeline: &str,
        step: Step,
        cancel: Cancellation,
        report: SharedReport,
    ) -> impl std::future::Future<Output = anyhow::Result<()>> + Send + 'static {
        let opts = ActionOpts::new(self.state.clone(), cancel.clone());
        let pipeline = pipeline.to_string();

        async move {
            let mut result = StepResult::started(&pipeline, &step);
            let outcome = step.run(opts).await;
            match &outcome {
                Ok(()) => result.mark_completed(StepStatus::Success, None),
                Err(_) if step.is_background() && cancel.is_cancelled() => {
                    result.mark_completed(StepStatus::Cancelled, None)
                }
                Err(e) => result.mark_completed(StepStatus::Failed, Some(format!("{e:#}"))),
            }
            lock(&report).record(result);

            if step.is_background() {
                if let Err(e) = &outcome {
                    if !cancel.is_cancelled() {
                        warn!(step = %step.name, error = %e, "Background step failed");
                    }
                }
            }
            outcome
        }
    }
}

#[async_trait]
impl Client for LocalClient {
    async fn done(&self, collection: &Collection) -> anyhow::Result<()> {
        if let Some(name) = &self.options.pipeline {
            collection.by_name(name)?;
        }
        self.seed_state().await.map_err(ExecutionError::from)?;

        let mut collection = collection.clone();
        collection.wrap_actions(TracedAction::wrap);

        let report: SharedReport = Arc::new(Mutex::new(RunReport::new(&self.options.build_id)));
        info!(
            build_id = %self.options.build_id,
            pipelines = collection.len(),
            "Starting run"
        );

        let this = self;
        let walked = &collection;
        let shared = &report;
        let result = collection
            .walk_pipelines(move |pipelines| this.run_pipelines(walked, pipelines, shared))
            .await;

        let mut finished = lock(&report).clone();
        finished.mark_completed();
        info!(
            status = %finished.status,
            total = finished.summary.total_steps,
            successful = finished.summary.successful_steps,
            failed = finished.summary.failed_steps,
            skipped = finished.summary.skipped_steps,
            duration = ?finished.duration,
            "Run finished"
        );
        *lock(&self.report) = Some(finished);

        result
    }

    fn root_args(&self) -> Vec<Argument> {
        let mut args = known::defaults();
        if self.options.pipeline.is_some() {
            args.push(known::pipeline_name());
        }
        args
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

// ABOUTME: Step execution results and run-level aggregation
// ABOUTME: Defines the per-step records and the summary report produced by a run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::pipeline::Step;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    Failed,
    Skipped,
    Timeout,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub pipeline: String,
    pub step: String,
    pub id: i64,
    pub status: StepStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration: Option<Duration>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
    Timeout,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_steps: usize,
    pub successful_steps: usize,
    pub failed_steps: usize,
    pub skipped_steps: usize,
    pub cancelled_steps: usize,
    pub success_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub build_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration: Option<Duration>,
    pub status: RunStatus,
    pub steps: Vec<StepResult>,
    pub summary: RunSummary,
}

impl StepResult {
    pub fn started(pipeline: &str, step: &Step) -> Self {
        Self {
            pipeline: pipeline.to_string(),
            step: step.name.clone(),
            id: step.id,
            status: StepStatus::Cancelled,
            start_time: Utc::now(),
            end_time: None,
            duration: None,
            error: None,
        }
    }

    pub fn skipped(pipeline: &str, step: &Step) -> Self {
        let mut result = Self::started(pipeline, step);
        result.mark_completed(StepStatus::Skipped, None);
        result
    }

    pub fn mark_completed(&mut self, status: StepStatus, error: Option<String>) {
        let now = Utc::now();
        self.status = status;
        self.end_time = Some(now);
        self.duration = Some((now - self.start_time).to_std().unwrap_or(Duration::ZERO));
        self.error = error;
    }

    pub fn is_successful(&self) -> bool {
        self.status == StepStatus::Success
    }

    pub fn is_failed(&self) -> bool {
        matches!(
            self.status,
            StepStatus::Failed | StepStatus::Timeout | StepStatus::Cancelled
        )
    }
}

impl RunReport {
    pub fn new(build_id: impl Into<String>) -> Self {
        Self {
            build_id: build_id.into(),
            start_time: Utc::now(),
            end_time: None,
            duration: None,
            status: RunStatus::Running,
            steps: Vec::new(),
            summary: RunSummary::default(),
        }
    }

    /// Add a step result. The first result recorded for a step wins, so late
    /// completions of abandoned actions do not overwrite it.
    pub fn record(&mut self, result: StepResult) {
        if self.get(&result.pipeline, result.id).is_some() {
            return;
        }
        self.steps.push(result);
        self.update_summary();
    }

    pub fn get(&self, pipeline: &str, id: i64) -> Option<&StepResult> {
        self.steps
            .iter()
            .find(|result| result.pipeline == pipeline && result.id == id)
    }

    pub fn has_failures(&self) -> bool {
        self.steps.iter().any(StepResult::is_failed)
    }

    pub fn mark_completed(&mut self) {
        let now = Utc::now();
        self.end_time = Some(now);
        self.duration = Some((now - self.start_time).to_std().unwrap_or(Duration::ZERO));
        self.update_status();
        self.update_summary();
    }

    fn update_status(&mut self) {
        self.status = if self.steps.iter().any(|s| s.status == StepStatus::Timeout) {
            RunStatus::Timeout
        } else if self.has_failures() {
            RunStatus::Failed
        } else {
            RunStatus::Success
        };
    }

    fn update_summary(&mut self) {
        let total = self.steps.len();
        let count = |status: StepStatus| self.steps.iter().filter(|s| s.status == status).count();
        let successful = count(StepStatus::Success);

        self.summary = RunSummary {
            total_steps: total,
            successful_steps: successful,
            failed_steps: count(StepStatus::Failed) + count(StepStatus::Timeout),
            skipped_steps: count(StepStatus::Skipped),
            cancelled_steps: count(StepStatus::Cancelled),
            success_rate: if total > 0 {
                (successful as f64 / total as f64) * 100.0
            } else {
                0.0
            },
        };
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Success => write!(f, "success"),
            StepStatus::Failed => write!(f, "failed"),
            StepStatus::Skipped => write!(f, "skipped"),
            StepStatus::Timeout => write!(f, "timeout"),
            StepStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Running => write!(f, "running"),
            RunStatus::Success => write!(f, "success"),
            RunStatus::Failed => write!(f, "failed"),
            RunStatus::Timeout => write!(f, "timeout"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_result_lifecycle() {
        let step = Step::noop("compile").with_id(3);
        let mut result = StepResult::started("build", &step);
        assert!(result.end_time.is_none());

        result.mark_completed(StepStatus::Success, None);
        assert!(result.is_successful());
        assert!(!result.is_failed());
        assert!(result.duration.is_some());
    }

    #[test]
    fn test_report_aggregation() {
        let mut report = RunReport::new("build-1");

        let mut ok = StepResult::started("build", &Step::noop("a").with_id(1));
        ok.mark_completed(StepStatus::Success, None);
        let mut failed = StepResult::started("build", &Step::noop("b").with_id(2));
        failed.mark_completed(StepStatus::Failed, Some("exit 1".to_string()));

        report.record(ok);
        report.record(failed.clone());
        report.record(StepResult::skipped("deploy", &Step::noop("c").with_id(1)));
        // duplicate of an already recorded step is ignored
        report.record(StepResult::skipped("build", &Step::noop("b").with_id(2)));
        report.mark_completed();

        assert_eq!(report.summary.total_steps, 3);
        assert_eq!(report.summary.successful_steps, 1);
        assert_eq!(report.summary.failed_steps, 1);
        assert_eq!(report.summary.skipped_steps, 1);
        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(report.get("build", 2).unwrap().status, StepStatus::Failed);
    }

    #[test]
    fn test_report_serializes_statuses_in_snake_case() {
        let mut report = RunReport::new("b");
        report.mark_completed();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "success");
    }
}

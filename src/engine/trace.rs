// ABOUTME: Action decorator that runs every step inside its own tracing span
// ABOUTME: Logs start, duration and failure of each step with pipeline and step fields

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, info_span, Instrument};

use crate::pipeline::{Action, ActionOpts, Step};

pub struct TracedAction {
    inner: Arc<dyn Action>,
    pipeline: String,
    step: String,
    id: i64,
}

impl TracedAction {
    pub fn wrap(pipeline: &str, step: &Step, inner: Arc<dyn Action>) -> Arc<dyn Action> {
        Arc::new(Self {
            inner,
            pipeline: pipeline.to_string(),
            step: step.name.clone(),
            id: step.id,
        })
    }
}

#[async_trait]
impl Action for TracedAction {
    async fn run(&self, opts: ActionOpts) -> anyhow::Result<()> {
        let span = info_span!("step", pipeline = %self.pipeline, step = %self.step, id = self.id);

        async move {
            let started = Instant::now();
            info!("Starting step");

            let result = self.inner.run(opts).await;
            match &result {
                Ok(()) => info!(elapsed = ?started.elapsed(), "Step finished"),
                Err(e) => error!(elapsed = ?started.elapsed(), error = %format!("{e:#}"), "Step failed"),
            }
            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::cancellation;
    use crate::state::MemoryState;

    #[tokio::test]
    async fn test_wrapped_action_keeps_result() {
        let step = Step::new("fail", |_| async { Err(anyhow::anyhow!("bad input")) }).with_id(4);
        let traced = TracedAction::wrap("build", &step, step.action.clone().unwrap());

        let (_handle, cancel) = cancellation();
        let err = traced
            .run(ActionOpts::new(Arc::new(MemoryState::new()), cancel))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "bad input");
    }
}

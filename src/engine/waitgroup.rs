// ABOUTME: Runs one batch of actions concurrently under a shared deadline
// ABOUTME: Returns on the first failure or timeout and signals cancellation to the rest

use futures::future::BoxFuture;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

use super::cancel::{cancellation, CancelHandle, Cancellation};
use super::error::{ExecutionError, Result};

type Outcome = (String, std::result::Result<anyhow::Result<()>, Box<dyn Any + Send>>);

pub struct WaitGroup {
    tasks: Vec<(String, BoxFuture<'static, anyhow::Result<()>>)>,
    limit: Option<Arc<Semaphore>>,
    handle: Arc<CancelHandle>,
    token: Cancellation,
}

impl Default for WaitGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitGroup {
    pub fn new() -> Self {
        let (handle, token) = cancellation();
        Self {
            tasks: Vec::new(),
            limit: None,
            handle: Arc::new(handle),
            token,
        }
    }

    /// At most `max_concurrent` actions run at the same time.
    pub fn with_limit(max_concurrent: usize) -> Self {
        Self {
            limit: Some(Arc::new(Semaphore::new(max_concurrent.max(1)))),
            ..Self::new()
        }
    }

    /// Signal fired when [`wait`](WaitGroup::wait) gives up on the batch.
    pub fn cancellation(&self) -> Cancellation {
        self.token.clone()
    }

    pub fn add<F>(&mut self, name: impl Into<String>, action: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.tasks.push((name.into(), action.boxed()));
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Run every added action and wait for all of them.
    ///
    /// Returns the first failure as soon as it arrives, or
    /// [`ExecutionError::Timeout`] once `timeout` elapses. In both cases the
    /// cancellation signal fires and the remaining actions are left to wind
    /// down on their own.
    pub async fn wait(self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut set: JoinSet<Outcome> = JoinSet::new();

        for (name, action) in self.tasks {
            let limit = self.limit.clone();
            let token = self.token.clone();
            let handle = self.handle.clone();
            set.spawn(async move {
                let _permit = match limit {
                    Some(semaphore) => tokio::select! {
                        biased;
                        _ = token.cancelled() => None,
                        permit = semaphore.acquire_owned() => permit.ok(),
                    },
                    None => None,
                };
                // Queued actions never start once the batch has been given up.
                if token.is_cancelled() {
                    debug!(action = %name, "Skipping action of a cancelled batch");
                    return (name, Ok(Ok(())));
                }
                let outcome = AssertUnwindSafe(action).catch_unwind().await;
                if !matches!(outcome, Ok(Ok(()))) {
                    // Fire before the permit is released so no queued sibling starts.
                    handle.cancel();
                }
                (name, outcome)
            });
        }

        let result = loop {
            match timeout_at(deadline, set.join_next()).await {
                Err(_) => break Err(ExecutionError::Timeout { timeout }),
                Ok(None) => break Ok(()),
                Ok(Some(Ok((name, Ok(Ok(())))))) => {
                    debug!(action = %name, "Action finished");
                }
                Ok(Some(Ok((name, Ok(Err(e)))))) => {
                    break Err(ExecutionError::ActionFailed {
                        name,
                        message: format!("{e:#}"),
                    })
                }
                Ok(Some(Ok((name, Err(panic))))) => {
                    break Err(ExecutionError::ActionPanicked {
                        name,
                        message: panic_message(panic.as_ref()),
                    })
                }
                Ok(Some(Err(e))) => break Err(ExecutionError::Join(e)),
            }
        };

        if let Err(e) = &result {
            warn!(error = %e, in_flight = set.len(), "Cancelling remaining actions");
            self.handle.cancel();
            set.detach_all();
        }

        result
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

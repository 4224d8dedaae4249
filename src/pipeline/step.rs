// ABOUTME: Step definition: an action plus the arguments it requires and provides
// ABOUTME: Also defines the Action trait and the options passed to every action run

use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::io::AsyncWrite;

use super::argument::Argument;
use crate::engine::Cancellation;
use crate::state::StateHandler;

/// Everything an action gets to work with.
pub struct ActionOpts {
    pub stdout: Box<dyn AsyncWrite + Send + Unpin>,
    pub stderr: Box<dyn AsyncWrite + Send + Unpin>,
    pub state: Arc<dyn StateHandler>,
    /// Fires when the surrounding batch fails or times out, or when the
    /// pipeline ends for background steps.
    pub cancel: Cancellation,
}

impl ActionOpts {
    pub fn new(state: Arc<dyn StateHandler>, cancel: Cancellation) -> Self {
        Self {
            stdout: Box::new(tokio::io::stdout()),
            stderr: Box::new(tokio::io::stderr()),
            state,
            cancel,
        }
    }

    pub fn with_stdout(mut self, stdout: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        self.stdout = Box::new(stdout);
        self
    }

    pub fn with_stderr(mut self, stderr: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        self.stderr = Box::new(stderr);
        self
    }
}

#[async_trait]
pub trait Action: Send + Sync {
    async fn run(&self, opts: ActionOpts) -> anyhow::Result<()>;
}

struct FnAction<F>(F);

#[async_trait]
impl<F, Fut> Action for FnAction<F>
where
    F: Fn(ActionOpts) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn run(&self, opts: ActionOpts) -> anyhow::Result<()> {
        (self.0)(opts).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepKind {
    #[default]
    Normal,
    /// Runs for the lifetime of its pipeline (e.g. a sidecar service); hangs
    /// off the root node and is never waited on by later batches.
    Background,
}

#[derive(Clone, Default)]
pub struct Step {
    /// Assigned by the pipeline when left at `0`.
    pub id: i64,
    pub name: String,
    /// Execution hint, e.g. the container image a client should run this step in.
    pub image: Option<String>,
    pub action: Option<Arc<dyn Action>>,
    pub requires: Vec<Argument>,
    pub provides: Vec<Argument>,
    pub kind: StepKind,
}

impl Step {
    pub fn new<F, Fut>(name: impl Into<String>, action: F) -> Self
    where
        F: Fn(ActionOpts) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self::from_action(name, Arc::new(FnAction(action)))
    }

    pub fn from_action(name: impl Into<String>, action: Arc<dyn Action>) -> Self {
        Self {
            name: name.into(),
            action: Some(action),
            ..Default::default()
        }
    }

    /// A step without an action; useful as a pure ordering point.
    pub fn noop(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn requires(mut self, args: impl IntoIterator<Item = Argument>) -> Self {
        self.requires.extend(args);
        self
    }

    pub fn provides(mut self, args: impl IntoIterator<Item = Argument>) -> Self {
        self.provides.extend(args);
        self
    }

    pub fn background(mut self) -> Self {
        self.kind = StepKind::Background;
        self
    }

    pub fn is_background(&self) -> bool {
        self.kind == StepKind::Background
    }

    pub async fn run(&self, opts: ActionOpts) -> anyhow::Result<()> {
        match &self.action {
            Some(action) => action.run(opts).await,
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("image", &self.image)
            .field("has_action", &self.action.is_some())
            .field("requires", &self.requires)
            .field("provides", &self.provides)
            .field("kind", &self.kind)
            .finish()
    }
}

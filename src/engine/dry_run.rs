// ABOUTME: Client that prints the execution plan instead of running anything
// ABOUTME: Shows pipeline batches, step batches, image hints and the step graph

use async_trait::async_trait;
use std::fmt::Write as _;
use std::io::Write;
use std::sync::Mutex;

use super::client::Client;
use super::error::{ExecutionError, Result};
use crate::pipeline::{Collection, PipelineError, Step, StepKind};

pub struct DryRunClient<W> {
    out: Mutex<W>,
}

impl DryRunClient<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> DryRunClient<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Render the ordered plan of a built collection.
    pub fn render(collection: &Collection) -> std::result::Result<String, PipelineError> {
        let mut out = String::new();

        for (index, batch) in collection.pipeline_batches()?.into_iter().enumerate() {
            let _ = writeln!(out, "Pipeline batch {}:", index + 1);

            for id in batch {
                let pipeline = collection.pipeline(id)?;
                let _ = writeln!(out, "  {} (id {})", pipeline.name, pipeline.id);

                for (step_index, steps) in pipeline.step_batches()?.into_iter().enumerate() {
                    let _ = writeln!(out, "    Step batch {}:", step_index + 1);
                    for step in steps {
                        let _ = writeln!(out, "      - {}", describe(&step));
                    }
                }

                let _ = writeln!(out, "    Graph:");
                let tree = pipeline.graph().render(|node| {
                    if node.id == crate::graph::ROOT_ID {
                        "(root)".to_string()
                    } else {
                        node.value.name.clone()
                    }
                });
                for line in tree.lines() {
                    let _ = writeln!(out, "      {line}");
                }
            }
        }

        Ok(out)
    }
}

fn describe(step: &Step) -> String {
    let mut line = step.name.clone();
    if let Some(image) = &step.image {
        let _ = write!(line, " [{image}]");
    }
    if step.kind == StepKind::Background {
        line.push_str(" (background)");
    }
    if !step.requires.is_empty() {
        let keys: Vec<_> = step.requires.iter().map(|arg| arg.key.as_str()).collect();
        let _ = write!(line, " requires: {}", keys.join(", "));
    }
    if !step.provides.is_empty() {
        let keys: Vec<_> = step.provides.iter().map(|arg| arg.key.as_str()).collect();
        let _ = write!(line, " provides: {}", keys.join(", "));
    }
    line
}

#[async_trait]
impl<W: Write + Send> Client for DryRunClient<W> {
    fn validate(&self, step: &Step) -> Result<()> {
        if step.name.trim().is_empty() {
            return Err(ExecutionError::Validation {
                step: format!("#{}", step.id),
                reason: "every step needs a name".to_string(),
            });
        }
        Ok(())
    }

    async fn done(&self, collection: &Collection) -> anyhow::Result<()> {
        let plan = Self::render(collection)?;
        let mut out = match self.out.lock() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        };
        out.write_all(plan.as_bytes())?;
        out.flush()?;
        Ok(())
    }
}

// ABOUTME: Common utilities and helpers for integration tests
// ABOUTME: Provides a pipeline builder with recording steps and a scratch test environment

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use trellis::engine::{LocalClient, LocalOptions};
use trellis::pipeline::{Argument, Pipeline, Step};
use trellis::state::{MemoryState, StateHandler, StateWriter};

/// Names of steps in the order they started running.
pub type RunLog = Arc<Mutex<Vec<String>>>;

pub struct TestPipelineBuilder {
    name: String,
    requires: Vec<Argument>,
    provides: Vec<Argument>,
    steps: Vec<Step>,
    log: RunLog,
}

impl TestPipelineBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            requires: Vec::new(),
            provides: Vec::new(),
            steps: Vec::new(),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn requires(mut self, args: &[&str]) -> Self {
        self.requires.extend(args.iter().map(|key| Argument::string(*key)));
        self
    }

    pub fn provides(mut self, args: &[&str]) -> Self {
        self.provides.extend(args.iter().map(|key| Argument::string(*key)));
        self
    }

    /// A step that logs its name and writes `"<name>-output"` to every
    /// string argument it provides.
    pub fn add_step(mut self, name: &str, requires: &[&str], provides: &[&str]) -> Self {
        let outputs: Vec<Argument> = provides.iter().map(|key| Argument::string(*key)).collect();
        let step = recording_step(name, &self.log, Duration::ZERO, outputs.clone())
            .requires(requires.iter().map(|key| Argument::string(*key)))
            .provides(outputs);
        self.steps.push(step);
        self
    }

    pub fn add_slow_step(mut self, name: &str, delay: Duration) -> Self {
        self.steps
            .push(recording_step(name, &self.log, delay, Vec::new()));
        self
    }

    pub fn add_failing_step(mut self, name: &str, requires: &[&str]) -> Self {
        let log = self.log.clone();
        let step_name = name.to_string();
        let step = Step::new(name, move |_opts| {
            let log = log.clone();
            let name = step_name.clone();
            async move {
                log.lock().unwrap().push(name);
                Err::<(), _>(anyhow::anyhow!("exit status 1"))
            }
        })
        .requires(requires.iter().map(|key| Argument::string(*key)));
        self.steps.push(step);
        self
    }

    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn log(&self) -> RunLog {
        self.log.clone()
    }

    pub fn build(self) -> Pipeline {
        let mut pipeline = Pipeline::new(self.name)
            .requires(self.requires)
            .provides(self.provides);
        pipeline
            .add_steps(self.steps)
            .expect("Failed to add steps");
        pipeline
    }
}

fn recording_step(name: &str, log: &RunLog, delay: Duration, outputs: Vec<Argument>) -> Step {
    let log = log.clone();
    let step_name = name.to_string();
    Step::new(name, move |opts| {
        let log = log.clone();
        let name = step_name.clone();
        let outputs = outputs.clone();
        async move {
            log.lock().unwrap().push(name.clone());
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            for output in &outputs {
                opts.state
                    .set_string(output, &format!("{name}-output"))
                    .await?;
            }
            Ok(())
        }
    })
}

/// Step names of every batch, in order.
pub fn batch_names(pipeline: &Pipeline) -> Vec<Vec<String>> {
    pipeline
        .step_batches()
        .expect("Failed to batch steps")
        .into_iter()
        .map(|batch| batch.into_iter().map(|step| step.name).collect())
        .collect()
}

pub fn local_client(state: Arc<dyn StateHandler>) -> LocalClient {
    LocalClient::new(
        state,
        LocalOptions {
            batch_timeout: Duration::from_secs(10),
            build_id: "test-build".to_string(),
            ..Default::default()
        },
    )
}

pub fn memory_state() -> Arc<MemoryState> {
    Arc::new(MemoryState::new())
}

pub struct TestEnvironment {
    pub temp_dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn state_file(&self) -> PathBuf {
        self.path().join("state.json")
    }

    /// Create a small directory tree to archive.
    pub fn create_tree(&self, name: &str) -> PathBuf {
        let root = self.path().join(name);
        std::fs::create_dir_all(root.join("nested")).expect("Failed to create tree");
        std::fs::write(root.join("top.txt"), b"top level\n").expect("Failed to write file");
        std::fs::write(root.join("nested").join("data.bin"), [0u8, 1, 2, 254, 255])
            .expect("Failed to write file");
        root
    }
}

/// Every entry under `root` by relative path: file bytes, `None` for directories.
pub fn tree_contents(root: &Path) -> BTreeMap<PathBuf, Option<Vec<u8>>> {
    walkdir::WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .map(|entry| {
            let entry = entry.expect("Failed to walk tree");
            let relative = entry
                .path()
                .strip_prefix(root)
                .expect("Entry outside tree")
                .to_path_buf();
            let contents = entry
                .file_type()
                .is_file()
                .then(|| std::fs::read(entry.path()).expect("Failed to read file"));
            (relative, contents)
        })
        .collect()
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

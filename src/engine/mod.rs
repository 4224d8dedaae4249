// ABOUTME: Execution engine: clients, the batch wait group and run reporting
// ABOUTME: Turns a built pipeline collection into ordered, concurrent action runs

pub mod cancel;
pub mod client;
pub mod dry_run;
pub mod error;
pub mod local;
pub mod result;
pub mod runner;
pub mod trace;
pub mod waitgroup;

pub use cancel::{cancellation, CancelHandle, Cancellation};
pub use client::Client;
pub use dry_run::DryRunClient;
pub use error::{ExecutionError, Result};
pub use local::{LocalClient, LocalOptions};
pub use result::{RunReport, RunStatus, RunSummary, StepResult, StepStatus};
pub use runner::Engine;
pub use trace::TracedAction;
pub use waitgroup::WaitGroup;

// src/exec/backend.rs

//! Pluggable executor backend.
//!
//! The runtime hands dispatched jobs to an `ExecutorBackend` instead of
//! spawning them itself, so tests can observe or reorder dispatch while the
//! production backend simply spawns one tokio task per job.

use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::engine::{RunEvent, TaskOutcome};
use crate::errors::TaskExecutionError;
use crate::exec::task_runner::{execute, panic_message, record_abort, TaskJob};

/// How dispatched jobs are executed.
///
/// An implementation must eventually send exactly one
/// `RunEvent::TaskFinished` per job it receives, after the job's TaskRun is
/// terminal in the state store.
pub trait ExecutorBackend: Send {
    fn spawn_job(&mut self, job: TaskJob, events: mpsc::UnboundedSender<RunEvent>);
}

/// Default backend: every job runs on its own tokio task.
///
/// If that task dies without reporting, the TaskRun is recorded `Failed` and
/// the runtime still gets its `TaskFinished`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioBackend;

impl ExecutorBackend for TokioBackend {
    fn spawn_job(&mut self, job: TaskJob, events: mpsc::UnboundedSender<RunEvent>) {
        let node = job.node;
        debug!(task = %job.task_name(), "spawning executor");

        let store = Arc::clone(&job.store);

        tokio::spawn(async move {
            let outcome = match tokio::spawn(execute(job)).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    error!(run_id = %store.run_id(), error = %err, "executor task died");
                    let cause = if err.is_panic() {
                        TaskExecutionError::Panicked(panic_message(err.into_panic().as_ref()))
                    } else {
                        TaskExecutionError::Failed(anyhow!("executor aborted: {err}"))
                    };
                    record_abort(&store, node, cause);
                    TaskOutcome::Failed
                }
            };
            // The runtime may already be gone if the caller dropped the run.
            let _ = events.send(RunEvent::TaskFinished { node, outcome });
        });
    }
}

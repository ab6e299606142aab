// src/task/context.rs

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::errors::CancellationError;
use crate::types::RunId;

/// Explicit per-invocation context handed to every task computation.
///
/// There is no ambient "current run": everything a computation may want to
/// know about the run it belongs to is reachable from here, so several flow
/// runs can execute in one process without cross-talk.
#[derive(Debug, Clone)]
pub struct TaskContext {
    flow: Arc<str>,
    run_id: RunId,
    task: Arc<str>,
    attempt: u32,
    max_attempts: u32,
    cancel: CancellationToken,
}

impl TaskContext {
    pub(crate) fn new(
        flow: Arc<str>,
        run_id: RunId,
        task: Arc<str>,
        attempt: u32,
        max_attempts: u32,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            flow,
            run_id,
            task,
            attempt,
            max_attempts,
            cancel,
        }
    }

    pub fn flow_name(&self) -> &str {
        &self.flow
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Node name of the task inside its flow (may carry a `-n` suffix when
    /// the same task is called more than once).
    pub fn task_name(&self) -> &str {
        &self.task
    }

    /// 1-based attempt number of this invocation.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cooperative cancellation point.
    ///
    /// Returns `Err` once the run has been cancelled; propagate it with `?` to
    /// abandon the computation. The executor records such a TaskRun as
    /// `Skipped` and never retries it.
    pub fn checkpoint(&self) -> Result<(), CancellationError> {
        if self.cancel.is_cancelled() {
            Err(CancellationError {
                run_id: self.run_id,
            })
        } else {
            Ok(())
        }
    }

    /// Resolves when the run is cancelled. Useful in `tokio::select!`.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}

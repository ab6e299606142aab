// src/exec/task_runner.rs

//! Runs one TaskRun to a terminal state.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::dag::graph::Source;
use crate::dag::{DependencyGraph, NodeId};
use crate::engine::TaskOutcome;
use crate::errors::{CancellationError, TaskExecutionError};
use crate::store::{StateStore, Transition};
use crate::task::{RetryPolicy, Task, TaskContext};
use crate::types::{RunId, TaskRunState, Value};

/// Everything an executor needs to run one dispatched node.
#[derive(Debug, Clone)]
pub struct TaskJob {
    pub node: NodeId,
    pub graph: Arc<DependencyGraph>,
    pub store: Arc<StateStore>,
    pub args: Arc<[Value]>,
    pub policy: RetryPolicy,
    pub cancel: CancellationToken,
}

impl TaskJob {
    pub fn task_name(&self) -> &str {
        self.graph.node(self.node).name()
    }

    fn run_id(&self) -> RunId {
        self.store.run_id()
    }

    fn record(&self, transition: Transition) {
        if let Err(err) = self.store.transition(self.node, transition) {
            error!(run_id = %self.run_id(), error = %err, "rejected task transition");
        }
    }

    fn cancellation(&self) -> Arc<TaskExecutionError> {
        Arc::new(TaskExecutionError::Cancelled(CancellationError {
            run_id: self.run_id(),
        }))
    }
}

/// Execute a dispatched node until it is terminal.
///
/// Inputs are read from the recorded outputs of the node's predecessors,
/// which the scheduler guarantees are all `Success`. Each failed attempt is
/// retried according to `job.policy`, waiting the backoff delay between
/// attempts. Cancellation is observed before every attempt, during the
/// backoff wait and after each attempt; a result produced after cancellation
/// is discarded and the TaskRun ends `Skipped`.
pub async fn execute(job: TaskJob) -> TaskOutcome {
    let node = job.graph.node(job.node);
    let name = node.name();
    let run_id = job.run_id();

    if job.cancel.is_cancelled() {
        debug!(%run_id, task = %name, "run cancelled before start");
        job.record(Transition::Skip {
            cause: Some(job.cancellation()),
        });
        return TaskOutcome::Skipped;
    }

    let inputs = match resolve_inputs(&job) {
        Ok(inputs) => inputs,
        Err(err) => {
            error!(%run_id, task = %name, error = %err, "could not resolve task inputs");
            job.record(Transition::Start {
                attempt: 1,
                inputs: Vec::new(),
            });
            job.record(Transition::Fail {
                cause: Arc::new(err),
            });
            return TaskOutcome::Failed;
        }
    };

    let max_attempts = job.policy.max_attempts();
    let mut attempt = 1;

    loop {
        job.record(Transition::Start {
            attempt,
            inputs: inputs.clone(),
        });
        info!(%run_id, task = %name, attempt, max_attempts, "task started");

        let ctx = TaskContext::new(
            Arc::from(job.store.flow_name()),
            run_id,
            Arc::from(name),
            attempt,
            max_attempts,
            job.cancel.clone(),
        );

        let result = run_attempt(node.task(), ctx, inputs.clone()).await;

        if job.cancel.is_cancelled() {
            info!(%run_id, task = %name, attempt, "run cancelled; discarding task result");
            job.record(Transition::Skip {
                cause: Some(job.cancellation()),
            });
            return TaskOutcome::Skipped;
        }

        let err = match result {
            Ok(output) => {
                info!(%run_id, task = %name, attempt, "task succeeded");
                job.record(Transition::Succeed { output });
                return TaskOutcome::Success;
            }
            Err(err) if err.is_cancellation() => {
                info!(%run_id, task = %name, attempt, "task abandoned at checkpoint");
                job.record(Transition::Skip {
                    cause: Some(Arc::new(err)),
                });
                return TaskOutcome::Skipped;
            }
            Err(err) => Arc::new(err),
        };

        if !job.policy.should_retry(attempt) {
            error!(%run_id, task = %name, attempt, error = %err, "task failed");
            job.record(Transition::Fail { cause: err });
            return TaskOutcome::Failed;
        }

        let delay = job.policy.delay_for(attempt);
        warn!(
            %run_id,
            task = %name,
            attempt,
            max_attempts,
            ?delay,
            error = %err,
            "task attempt failed; retrying"
        );
        job.record(Transition::Retry { cause: err });

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = job.cancel.cancelled() => {
                info!(%run_id, task = %name, "run cancelled during backoff");
                job.record(Transition::Skip {
                    cause: Some(job.cancellation()),
                });
                return TaskOutcome::Skipped;
            }
        }

        attempt += 1;
    }
}

/// Invoke the computation once. A panic while building the future or while
/// polling it becomes `TaskExecutionError::Panicked`.
async fn run_attempt(
    task: &Task,
    ctx: TaskContext,
    inputs: Vec<Value>,
) -> Result<Value, TaskExecutionError> {
    let future = match panic::catch_unwind(AssertUnwindSafe(|| task.invoke(ctx, inputs))) {
        Ok(future) => future,
        Err(payload) => return Err(TaskExecutionError::Panicked(panic_message(payload.as_ref()))),
    };

    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(err)) => Err(TaskExecutionError::from_computation(err)),
        Err(payload) => Err(TaskExecutionError::Panicked(panic_message(payload.as_ref()))),
    }
}

/// Force a TaskRun whose executor died into `Failed`, recording `cause`.
///
/// No-op if the TaskRun is already terminal.
pub(crate) fn record_abort(store: &StateStore, node: NodeId, cause: TaskExecutionError) {
    let record = store.record(node);
    if record.is_terminal() {
        return;
    }

    if record.state != TaskRunState::Running {
        if let Err(err) = store.transition(
            node,
            Transition::Start {
                attempt: record.attempts + 1,
                inputs: Vec::new(),
            },
        ) {
            error!(run_id = %store.run_id(), error = %err, "rejected task transition");
            return;
        }
    }

    if let Err(err) = store.transition(node, Transition::Fail { cause: Arc::new(cause) }) {
        error!(run_id = %store.run_id(), error = %err, "rejected task transition");
    }
}

fn resolve_inputs(job: &TaskJob) -> Result<Vec<Value>, TaskExecutionError> {
    job.graph
        .node(job.node)
        .inputs()
        .iter()
        .map(|source| resolve(source, job))
        .collect()
}

fn resolve(source: &Source, job: &TaskJob) -> Result<Value, TaskExecutionError> {
    match source {
        Source::Task(id) => job
            .store
            .output_of(*id)
            .ok_or_else(|| TaskExecutionError::MissingInput(job.graph.node(*id).name().to_string())),
        Source::Argument(i) => job
            .args
            .get(*i)
            .cloned()
            .ok_or_else(|| TaskExecutionError::MissingInput(format!("argument {i}"))),
        Source::Constant(value) => Ok(value.clone()),
        Source::List(items) => items
            .iter()
            .map(|item| resolve(item, job))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

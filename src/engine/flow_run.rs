// src/engine/flow_run.rs

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use anyhow::anyhow;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::dag::graph::Source;
use crate::dag::{DependencyGraph, NodeId};
use crate::errors::{CancellationError, FlowError, TaskExecutionError};
use crate::store::{StateStore, TaskRunRecord, TransitionEvent};
use crate::types::{FlowRunState, RunId, TaskRunState, Value};

/// Immutable result of one flow invocation.
///
/// Holds the run's TaskRun records and transition log for inspection after
/// the run is over.
#[derive(Debug, Clone)]
pub struct FlowRun {
    flow: Arc<str>,
    graph: Arc<DependencyGraph>,
    store: Arc<StateStore>,
    args: Arc<[Value]>,
    output: Source,
    state: FlowRunState,
}

impl FlowRun {
    pub(crate) fn new(
        flow: Arc<str>,
        graph: Arc<DependencyGraph>,
        store: Arc<StateStore>,
        args: Arc<[Value]>,
        output: Source,
        state: FlowRunState,
    ) -> Self {
        Self {
            flow,
            graph,
            store,
            args,
            output,
            state,
        }
    }

    pub fn run_id(&self) -> RunId {
        self.store.run_id()
    }

    pub fn flow_name(&self) -> &str {
        &self.flow
    }

    pub fn state(&self) -> FlowRunState {
        self.state
    }

    /// The graph this run executed (shared with every run of the flow).
    pub fn graph(&self) -> &Arc<DependencyGraph> {
        &self.graph
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// One record per task, in declaration order.
    pub fn task_runs(&self) -> Vec<TaskRunRecord> {
        self.store.snapshot()
    }

    pub fn task_run(&self, name: &str) -> Option<TaskRunRecord> {
        self.graph.id_of(name).map(|id| self.store.record(id))
    }

    pub fn transitions(&self) -> Vec<TransitionEvent> {
        self.store.transitions()
    }

    /// Output of the flow's terminal binding.
    ///
    /// Fails with the cause of the task that made the terminal task fail or
    /// be skipped, or with `FlowError::Cancelled` if the run was cancelled.
    pub fn result(&self) -> Result<Value, FlowError> {
        if self.state == FlowRunState::Cancelled {
            return Err(FlowError::Cancelled(CancellationError {
                run_id: self.run_id(),
            }));
        }
        self.resolve(&self.output)
    }

    /// Output of a single task, with the same failure reporting as
    /// [`FlowRun::result`].
    pub fn output_of(&self, name: &str) -> Result<Value, FlowError> {
        let id = self
            .graph
            .id_of(name)
            .ok_or_else(|| FlowError::Aborted(format!("no task named '{name}' in this run")))?;
        self.task_result(id)
    }

    fn resolve(&self, source: &Source) -> Result<Value, FlowError> {
        match source {
            Source::Task(id) => self.task_result(*id),
            Source::Argument(i) => self.args.get(*i).cloned().ok_or_else(|| FlowError::ArgumentCount {
                flow: self.flow.to_string(),
                expected: i + 1,
                got: self.args.len(),
            }),
            Source::Constant(value) => Ok(value.clone()),
            Source::List(items) => items
                .iter()
                .map(|item| self.resolve(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
        }
    }

    fn task_result(&self, id: NodeId) -> Result<Value, FlowError> {
        let record = self.store.record(id);
        match record.state {
            TaskRunState::Success => record
                .output
                .ok_or_else(|| FlowError::Aborted(format!("task '{}' has no output", record.name))),
            TaskRunState::Failed => Err(FlowError::TaskFailed {
                task: record.name,
                attempts: record.attempts,
                cause: cause_or_unknown(record.cause),
            }),
            TaskRunState::Skipped => Err(self.skipped_error(id)),
            state => Err(FlowError::Aborted(format!(
                "task '{}' is still {state}",
                record.name
            ))),
        }
    }

    /// Explain a skipped task: breadth-first search upstream for the nearest
    /// failed task.
    fn skipped_error(&self, skipped: NodeId) -> FlowError {
        let mut parent: HashMap<NodeId, NodeId> = HashMap::new();
        let mut queue = VecDeque::from([skipped]);

        while let Some(id) = queue.pop_front() {
            for &dep in self.graph.dependencies_of(id) {
                if dep == skipped || parent.contains_key(&dep) {
                    continue;
                }
                parent.insert(dep, id);

                if self.store.state_of(dep) == TaskRunState::Failed {
                    let mut path = vec![dep];
                    let mut cur = dep;
                    while let Some(&next) = parent.get(&cur) {
                        path.push(next);
                        cur = next;
                    }
                    path.reverse();

                    let origin = self.store.record(dep);
                    return FlowError::UpstreamFailed {
                        task: self.graph.node(skipped).name().to_string(),
                        path: path
                            .into_iter()
                            .map(|id| self.graph.node(id).name().to_string())
                            .collect(),
                        origin: origin.name,
                        cause: cause_or_unknown(origin.cause),
                    };
                }
                queue.push_back(dep);
            }
        }

        FlowError::Skipped(self.graph.node(skipped).name().to_string())
    }
}

fn cause_or_unknown(cause: Option<Arc<TaskExecutionError>>) -> Arc<TaskExecutionError> {
    cause.unwrap_or_else(|| Arc::new(TaskExecutionError::Failed(anyhow!("no cause recorded"))))
}

/// Handle to a flow run started with `Flow::start`.
///
/// Dropping the handle does not cancel the run.
#[derive(Debug)]
pub struct FlowRunHandle {
    run_id: RunId,
    cancel: CancellationToken,
    join: JoinHandle<FlowRun>,
}

impl FlowRunHandle {
    pub(crate) fn new(run_id: RunId, cancel: CancellationToken, join: JoinHandle<FlowRun>) -> Self {
        Self {
            run_id,
            cancel,
            join,
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Request cooperative cancellation of the run.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the run to finish.
    pub async fn join(self) -> Result<FlowRun, FlowError> {
        self.join
            .await
            .map_err(|err| FlowError::Aborted(format!("flow run {} task failed: {err}", self.run_id)))
    }

    /// Wait for the run and return its result.
    pub async fn result(self) -> Result<Value, FlowError> {
        self.join().await?.result()
    }
}

// src/errors.rs

//! Crate-wide error types.
//!
//! - [`GraphError`] / [`CycleError`]: construction time, never retried.
//! - [`TaskExecutionError`]: one failed attempt of a task computation.
//! - [`FlowError`]: what `Flow::invoke` returns when the terminal task did not
//!   succeed.
//! - [`CancellationError`]: the run was cancelled.
//! - [`DagflowError`]: configuration / IO errors plus everything above.

use std::sync::Arc;

use thiserror::Error;

use crate::types::{RunId, TaskRunState};

#[derive(Error, Debug)]
pub enum DagflowError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Flow(#[from] FlowError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DagflowError>;

/// A dependency cycle found while building a graph.
///
/// `tasks` lists every task of the offending strongly connected component in
/// declaration order.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cycle detected in task graph involving {}", .tasks.join(", "))]
pub struct CycleError {
    pub tasks: Vec<String>,
}

impl CycleError {
    pub fn involves(&self, task: &str) -> bool {
        self.tasks.iter().any(|t| t == task)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error(transparent)]
    Cycle(#[from] CycleError),

    #[error("task '{0}' is declared more than once")]
    DuplicateTask(String),

    #[error("task '{task}' depends on unknown task '{dependency}'")]
    UnknownDependency { task: String, dependency: String },

    #[error("flow output refers to unknown task '{0}'")]
    UnknownOutput(String),
}

/// The run a computation belongs to was cancelled.
///
/// Returned by `TaskContext::checkpoint`; computations propagate it with `?`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("flow run {run_id} was cancelled")]
pub struct CancellationError {
    pub run_id: RunId,
}

/// Why a single attempt of a task did not produce a value.
#[derive(Error, Debug)]
pub enum TaskExecutionError {
    #[error(transparent)]
    Failed(anyhow::Error),

    #[error("task panicked: {0}")]
    Panicked(String),

    #[error("input from '{0}' is not available")]
    MissingInput(String),

    #[error(transparent)]
    Cancelled(#[from] CancellationError),
}

impl TaskExecutionError {
    /// Classify an error returned by a computation.
    ///
    /// A `CancellationError` propagated out of a checkpoint stays a
    /// cancellation instead of counting as a failure.
    pub fn from_computation(err: anyhow::Error) -> Self {
        match err.downcast::<CancellationError>() {
            Ok(cancelled) => TaskExecutionError::Cancelled(cancelled),
            Err(err) => TaskExecutionError::Failed(err),
        }
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, TaskExecutionError::Cancelled(_))
    }
}

/// A state transition that the TaskRun state machine does not allow.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid transition for task '{task}': {from} -> {to}")]
pub struct InvalidTransition {
    pub task: String,
    pub from: TaskRunState,
    pub to: TaskRunState,
}

/// Failure surfaced to the caller of `Flow::invoke`.
#[derive(Error, Debug, Clone)]
pub enum FlowError {
    #[error("task '{task}' failed after {attempts} attempt(s): {cause}")]
    TaskFailed {
        task: String,
        attempts: u32,
        cause: Arc<TaskExecutionError>,
    },

    /// The terminal task was skipped because something upstream failed.
    ///
    /// `path` runs from the skipped task to `origin`, the task that failed.
    #[error("task '{task}' was skipped because upstream task '{origin}' failed: {cause}")]
    UpstreamFailed {
        task: String,
        path: Vec<String>,
        origin: String,
        cause: Arc<TaskExecutionError>,
    },

    #[error("task '{0}' was skipped")]
    Skipped(String),

    #[error(transparent)]
    Cancelled(#[from] CancellationError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("flow '{flow}' expects {expected} argument(s) but got {got}")]
    ArgumentCount {
        flow: String,
        expected: usize,
        got: usize,
    },

    #[error("flow run aborted: {0}")]
    Aborted(String),
}

impl FlowError {
    /// The cause recorded by the task that originally failed, if any.
    pub fn cause(&self) -> Option<&TaskExecutionError> {
        match self {
            FlowError::TaskFailed { cause, .. } | FlowError::UpstreamFailed { cause, .. } => {
                Some(cause.as_ref())
            }
            _ => None,
        }
    }

    /// Task names from the task the caller asked for down to the origin of
    /// the failure.
    pub fn failure_chain(&self) -> Vec<String> {
        match self {
            FlowError::TaskFailed { task, .. } | FlowError::Skipped(task) => vec![task.clone()],
            FlowError::UpstreamFailed { path, .. } => path.clone(),
            _ => Vec::new(),
        }
    }
}

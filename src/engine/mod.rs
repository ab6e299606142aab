// src/engine/mod.rs

//! Orchestration engine for dagflow.
//!
//! This module ties together:
//! - the pure DAG scheduler (`dag::Scheduler`)
//! - the per-run state store
//! - the executor backend
//! - the public `Flow` entry point and its run results
//!
//! The async/IO shell that drives one run lives in [`runtime`]; [`flow`]
//! traces recipes into cached graphs and starts runs; [`flow_run`] holds the
//! immutable result handed back to callers.

use crate::dag::NodeId;
use crate::types::TaskRunState;

/// Terminal outcome of one TaskRun, as reported to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    Failed,
    Skipped,
}

impl From<TaskOutcome> for TaskRunState {
    fn from(outcome: TaskOutcome) -> Self {
        match outcome {
            TaskOutcome::Success => TaskRunState::Success,
            TaskOutcome::Failed => TaskRunState::Failed,
            TaskOutcome::Skipped => TaskRunState::Skipped,
        }
    }
}

/// Events flowing into the runtime from executors.
#[derive(Debug, Clone)]
pub enum RunEvent {
    /// A dispatched TaskRun reached a terminal state.
    TaskFinished { node: NodeId, outcome: TaskOutcome },
}

pub mod flow;
pub mod flow_run;
pub mod runtime;

pub use flow::{Flow, FlowOptions};
pub use flow_run::{FlowRun, FlowRunHandle};
pub use runtime::{run_graph, FlowRuntime};

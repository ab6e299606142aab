// src/dag/scheduler_step.rs

//! Step-by-step result type for the scheduler.

use crate::dag::graph::NodeId;

/// Structured result of a single scheduler "step".
///
/// The async runtime applies it in order: write the `Skipped` transitions,
/// then spawn executors for the dispatched nodes. Tests use it to step a run
/// by hand.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStep {
    /// Nodes handed to executors in this step, in dispatch order.
    pub newly_dispatched: Vec<NodeId>,
    /// Nodes that became `Skipped` in this step.
    pub newly_skipped: Vec<NodeId>,
    /// Whether every node is now terminal.
    pub run_just_finished: bool,
}

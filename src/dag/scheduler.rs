// src/dag/scheduler.rs

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::dag::graph::{DependencyGraph, NodeId};
use crate::dag::scheduler_step::SchedulerStep;
use crate::engine::TaskOutcome;

/// Per-node scheduling state (internal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    /// Some predecessors have not succeeded yet.
    Waiting,
    /// All predecessors succeeded; queued until a concurrency slot frees up.
    Ready,
    /// Handed to an executor, completion not yet reported.
    Dispatched,
    /// Terminal for this run.
    Done(TaskOutcome),
}

/// Read-only view of a node's scheduling state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleState {
    Waiting,
    Ready,
    Dispatched,
    Done(TaskOutcome),
}

impl From<Slot> for ScheduleState {
    fn from(slot: Slot) -> Self {
        match slot {
            Slot::Waiting => ScheduleState::Waiting,
            Slot::Ready => ScheduleState::Ready,
            Slot::Dispatched => ScheduleState::Dispatched,
            Slot::Done(outcome) => ScheduleState::Done(outcome),
        }
    }
}

/// Synchronous, deterministic scheduling state machine for one flow run.
///
/// It decides *which* nodes may run; it never runs anything itself. Callers
/// feed it completions and get back a [`SchedulerStep`] describing the nodes
/// that were newly dispatched or newly skipped. This keeps the dispatch rules
/// unit-testable without tokio.
///
/// Rules:
/// - a node becomes ready the moment all its predecessors reached `Success`,
///   regardless of which topological layer it sits in;
/// - at most `limit` nodes are dispatched at the same time, across the whole
///   run;
/// - when a node ends `Failed` or `Skipped`, every transitive dependent that
///   has not run is marked `Skipped`.
#[derive(Debug)]
pub struct Scheduler {
    graph: Arc<DependencyGraph>,
    slots: Vec<Slot>,
    /// Predecessors of each node that have not succeeded yet.
    unfinished_deps: Vec<usize>,
    ready: VecDeque<NodeId>,
    in_flight: usize,
    limit: usize,
    cancelled: bool,
    /// Topological layer of each node, computed once per run.
    layers: Vec<usize>,
}

impl Scheduler {
    /// `limit` is clamped to at least 1.
    pub fn new(graph: Arc<DependencyGraph>, limit: usize) -> Self {
        let slots = vec![Slot::Waiting; graph.len()];
        let unfinished_deps = graph.nodes().map(|n| n.dependencies().len()).collect();
        let layers = graph.layer_indices();

        Self {
            graph,
            slots,
            unfinished_deps,
            ready: VecDeque::new(),
            in_flight: 0,
            limit: limit.max(1),
            cancelled: false,
            layers,
        }
    }

    pub fn graph(&self) -> &Arc<DependencyGraph> {
        &self.graph
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of dispatched nodes whose completion has not been reported.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn state_of(&self, id: NodeId) -> ScheduleState {
        self.slots[id.0].into()
    }

    pub fn layer_of(&self, id: NodeId) -> usize {
        self.layers[id.0]
    }

    /// Every node is terminal.
    pub fn is_finished(&self) -> bool {
        self.slots.iter().all(|s| matches!(s, Slot::Done(_)))
    }

    /// Seed the run with its root nodes.
    pub fn start(&mut self) -> SchedulerStep {
        let roots: Vec<NodeId> = self.graph.roots().collect();
        debug!(roots = roots.len(), limit = self.limit, "scheduler: starting run");

        for id in roots {
            self.mark_ready(id);
        }

        self.finish_step(Vec::new())
    }

    /// Record the outcome reported for a dispatched node.
    pub fn step_completion(&mut self, id: NodeId, outcome: TaskOutcome) -> SchedulerStep {
        if self.slots[id.0] != Slot::Dispatched {
            warn!(
                task = %self.graph.node(id).name(),
                ?outcome,
                "completion for a task that is not in flight; ignoring"
            );
            return SchedulerStep::default();
        }

        self.slots[id.0] = Slot::Done(outcome);
        self.in_flight -= 1;

        let mut newly_skipped = Vec::new();

        match outcome {
            TaskOutcome::Success => {
                debug!(task = %self.graph.node(id).name(), "scheduler: task succeeded");
                if !self.cancelled {
                    let graph = Arc::clone(&self.graph);
                    for &dependent in graph.dependents_of(id) {
                        let remaining = &mut self.unfinished_deps[dependent.0];
                        *remaining -= 1;
                        if *remaining == 0 && self.slots[dependent.0] == Slot::Waiting {
                            self.mark_ready(dependent);
                        }
                    }
                }
            }
            TaskOutcome::Failed | TaskOutcome::Skipped => {
                newly_skipped = self.skip_dependents(id);
                if !newly_skipped.is_empty() {
                    info!(
                        task = %self.graph.node(id).name(),
                        ?outcome,
                        skipped = newly_skipped.len(),
                        "task did not succeed; skipping dependents"
                    );
                }
            }
        }

        self.finish_step(newly_skipped)
    }

    /// Cancel the run: every node that has not been dispatched is skipped.
    ///
    /// Dispatched nodes stay in flight until their executor reports back.
    pub fn cancel(&mut self) -> SchedulerStep {
        if self.cancelled {
            return SchedulerStep::default();
        }
        self.cancelled = true;
        self.ready.clear();

        let mut newly_skipped = Vec::new();
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if matches!(slot, Slot::Waiting | Slot::Ready) {
                *slot = Slot::Done(TaskOutcome::Skipped);
                newly_skipped.push(NodeId(i));
            }
        }

        info!(
            skipped = newly_skipped.len(),
            in_flight = self.in_flight,
            "scheduler: run cancelled"
        );

        self.finish_step(newly_skipped)
    }

    fn mark_ready(&mut self, id: NodeId) {
        self.slots[id.0] = Slot::Ready;
        self.ready.push_back(id);
    }

    /// Mark every transitive dependent of `failed` that is still waiting as
    /// skipped. Returns the newly skipped nodes.
    fn skip_dependents(&mut self, failed: NodeId) -> Vec<NodeId> {
        let mut stack: Vec<NodeId> = self.graph.dependents_of(failed).to_vec();
        let mut newly_skipped = Vec::new();

        while let Some(id) = stack.pop() {
            if self.slots[id.0] == Slot::Waiting {
                self.slots[id.0] = Slot::Done(TaskOutcome::Skipped);
                newly_skipped.push(id);
                stack.extend(self.graph.dependents_of(id).iter().copied());
            }
        }

        newly_skipped.sort_unstable();
        newly_skipped
    }

    /// Dispatch ready nodes while concurrency slots are available.
    fn dispatch_ready(&mut self) -> Vec<NodeId> {
        let mut dispatched = Vec::new();

        while self.in_flight < self.limit {
            let Some(id) = self.ready.pop_front() else {
                break;
            };

            debug_assert!(
                self.graph.dependencies_of(id).iter().all(|dep| {
                    self.slots[dep.0] == Slot::Done(TaskOutcome::Success)
                        && self.layers[dep.0] < self.layers[id.0]
                }),
                "premature dispatch of task '{}'",
                self.graph.node(id).name()
            );

            debug!(
                task = %self.graph.node(id).name(),
                layer = self.layers[id.0],
                in_flight = self.in_flight + 1,
                "dependencies satisfied; dispatching"
            );

            self.slots[id.0] = Slot::Dispatched;
            self.in_flight += 1;
            dispatched.push(id);
        }

        dispatched
    }

    fn finish_step(&mut self, newly_skipped: Vec<NodeId>) -> SchedulerStep {
        let newly_dispatched = self.dispatch_ready();
        let run_just_finished = self.is_finished();

        if run_just_finished {
            debug!("scheduler: all tasks terminal");
        }

        SchedulerStep {
            newly_dispatched,
            newly_skipped,
            run_just_finished,
        }
    }
}

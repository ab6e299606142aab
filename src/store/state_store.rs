// src/store/state_store.rs

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::dag::{DependencyGraph, NodeId};
use crate::errors::{InvalidTransition, TaskExecutionError};
use crate::store::Observers;
use crate::types::{RunId, TaskRunState, Value};

/// Snapshot of one TaskRun.
#[derive(Debug, Clone)]
pub struct TaskRunRecord {
    pub node: NodeId,
    pub name: String,
    pub state: TaskRunState,
    /// Number of attempts started so far.
    pub attempts: u32,
    /// Resolved inputs of the first attempt.
    pub inputs: Vec<Value>,
    pub output: Option<Value>,
    /// Cause of the most recent failed attempt (or of the skip, for
    /// cancellation).
    pub cause: Option<Arc<TaskExecutionError>>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl TaskRunRecord {
    fn pending(node: NodeId, name: &str) -> Self {
        Self {
            node,
            name: name.to_string(),
            state: TaskRunState::Pending,
            attempts: 0,
            inputs: Vec::new(),
            output: None,
            cause: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

/// Value or failure attached to a transition event.
#[derive(Debug, Clone)]
pub enum TransitionOutcome {
    Output(Value),
    Cause(Arc<TaskExecutionError>),
}

/// One entry of the transition log, as delivered to observers.
#[derive(Debug, Clone)]
pub struct TransitionEvent {
    pub run_id: RunId,
    pub flow: Arc<str>,
    pub task: String,
    pub attempt: u32,
    pub from: TaskRunState,
    pub to: TaskRunState,
    pub timestamp: DateTime<Utc>,
    pub outcome: Option<TransitionOutcome>,
    /// Position in the run's transition log, starting at 0.
    pub sequence: u64,
}

/// Requested state change for one TaskRun.
#[derive(Debug)]
pub(crate) enum Transition {
    Start { attempt: u32, inputs: Vec<Value> },
    Retry { cause: Arc<TaskExecutionError> },
    Succeed { output: Value },
    Fail { cause: Arc<TaskExecutionError> },
    Skip { cause: Option<Arc<TaskExecutionError>> },
}

impl Transition {
    fn target(&self) -> TaskRunState {
        match self {
            Transition::Start { .. } => TaskRunState::Running,
            Transition::Retry { .. } => TaskRunState::Retrying,
            Transition::Succeed { .. } => TaskRunState::Success,
            Transition::Fail { .. } => TaskRunState::Failed,
            Transition::Skip { .. } => TaskRunState::Skipped,
        }
    }
}

/// TaskRun table and transition log of one FlowRun.
///
/// Each entry has its own lock; the log mutex is held across every
/// transition, so the log order is a linearization of all state changes in
/// the run and observers see events in that order.
#[derive(Debug)]
pub struct StateStore {
    run_id: RunId,
    flow: Arc<str>,
    entries: Vec<RwLock<TaskRunRecord>>,
    log: Mutex<Vec<TransitionEvent>>,
    observers: Observers,
}

impl StateStore {
    pub fn new(run_id: RunId, flow: Arc<str>, graph: &DependencyGraph, observers: Observers) -> Self {
        let entries = graph
            .nodes()
            .map(|n| RwLock::new(TaskRunRecord::pending(n.id(), n.name())))
            .collect();

        Self {
            run_id,
            flow,
            entries,
            log: Mutex::new(Vec::new()),
            observers,
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn flow_name(&self) -> &str {
        &self.flow
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn state_of(&self, id: NodeId) -> TaskRunState {
        self.entries[id.0].read().state
    }

    pub fn record(&self, id: NodeId) -> TaskRunRecord {
        self.entries[id.0].read().clone()
    }

    /// Output of a task that reached `Success`.
    pub fn output_of(&self, id: NodeId) -> Option<Value> {
        let entry = self.entries[id.0].read();
        match entry.state {
            TaskRunState::Success => entry.output.clone(),
            _ => None,
        }
    }

    /// Copy of the transition log so far.
    pub fn transitions(&self) -> Vec<TransitionEvent> {
        self.log.lock().clone()
    }

    /// Copy of every record, in node order.
    pub fn snapshot(&self) -> Vec<TaskRunRecord> {
        self.entries.iter().map(|e| e.read().clone()).collect()
    }

    /// Apply a transition, append it to the log and publish it.
    pub(crate) fn transition(
        &self,
        id: NodeId,
        transition: Transition,
    ) -> Result<TransitionEvent, InvalidTransition> {
        let mut log = self.log.lock();
        let mut entry = self.entries[id.0].write();

        let from = entry.state;
        let to = transition.target();
        if !from.can_transition_to(to) {
            return Err(InvalidTransition {
                task: entry.name.clone(),
                from,
                to,
            });
        }

        let now = Utc::now();
        let outcome = match transition {
            Transition::Start { attempt, inputs } => {
                entry.attempts = attempt;
                if entry.started_at.is_none() {
                    entry.started_at = Some(now);
                    entry.inputs = inputs;
                }
                None
            }
            Transition::Retry { cause } => {
                entry.cause = Some(Arc::clone(&cause));
                Some(TransitionOutcome::Cause(cause))
            }
            Transition::Succeed { output } => {
                entry.output = Some(output.clone());
                entry.cause = None;
                entry.finished_at = Some(now);
                Some(TransitionOutcome::Output(output))
            }
            Transition::Fail { cause } => {
                entry.cause = Some(Arc::clone(&cause));
                entry.finished_at = Some(now);
                Some(TransitionOutcome::Cause(cause))
            }
            Transition::Skip { cause } => {
                if cause.is_some() {
                    entry.cause = cause.clone();
                }
                entry.finished_at = Some(now);
                cause.map(TransitionOutcome::Cause)
            }
        };
        entry.state = to;

        let event = TransitionEvent {
            run_id: self.run_id,
            flow: Arc::clone(&self.flow),
            task: entry.name.clone(),
            attempt: entry.attempts,
            from,
            to,
            timestamp: now,
            outcome,
            sequence: log.len() as u64,
        };
        drop(entry);

        trace!(
            run_id = %self.run_id,
            task = %event.task,
            from = %from,
            to = %to,
            sequence = event.sequence,
            "transition recorded"
        );
        if to.is_terminal() {
            debug!(run_id = %self.run_id, task = %event.task, state = %to, "task run terminal");
        }

        log.push(event.clone());
        self.observers.publish(&event);

        Ok(event)
    }
}

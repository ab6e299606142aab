#![allow(dead_code)]

use std::collections::HashSet;

use dagflow::types::TaskRunState;
use dagflow::TransitionEvent;
use tokio::sync::mpsc;

/// Drain every event currently buffered in `rx`.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<TransitionEvent>) -> Vec<TransitionEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}

/// Highest number of tasks that were `Running` at the same time.
pub fn max_concurrent_running(events: &[TransitionEvent]) -> usize {
    let mut running: HashSet<&str> = HashSet::new();
    let mut max = 0;
    for e in events {
        if e.to == TaskRunState::Running {
            running.insert(&e.task);
        } else if e.from == TaskRunState::Running {
            running.remove(e.task.as_str());
        }
        max = max.max(running.len());
    }
    max
}

/// Index of the first event moving `task` into `to`.
pub fn position(events: &[TransitionEvent], task: &str, to: TaskRunState) -> Option<usize> {
    events.iter().position(|e| e.task == task && e.to == to)
}

/// Index of the first event moving `task` out of `Pending`.
pub fn left_pending(events: &[TransitionEvent], task: &str) -> Option<usize> {
    events
        .iter()
        .position(|e| e.task == task && e.from == TaskRunState::Pending)
}

/// Index of the event making `task` terminal.
pub fn became_terminal(events: &[TransitionEvent], task: &str) -> Option<usize> {
    events
        .iter()
        .position(|e| e.task == task && e.to.is_terminal())
}

/// Sequence of states `task` went through, starting with its first target.
pub fn states_of(events: &[TransitionEvent], task: &str) -> Vec<TaskRunState> {
    events
        .iter()
        .filter(|e| e.task == task)
        .map(|e| e.to)
        .collect()
}

// src/types.rs

//! Small shared enums: task/flow run states and backoff kinds.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Deserialize;

/// Dynamically typed value flowing between tasks.
pub type Value = serde_json::Value;

/// Process-wide unique identifier of one FlowRun.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunId(u64);

impl RunId {
    /// Allocate a fresh id.
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        RunId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a single TaskRun.
///
/// ```text
/// Pending -> Running -> Success
///                    -> Failed
///                    -> Retrying -> Running (attempt + 1)
/// Pending -> Skipped            (upstream did not succeed, or cancelled)
/// Running | Retrying -> Skipped (cancelled while in flight)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskRunState {
    Pending,
    Running,
    Retrying,
    Success,
    Failed,
    Skipped,
}

impl TaskRunState {
    /// `Success`, `Failed` and `Skipped` never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskRunState::Success | TaskRunState::Failed | TaskRunState::Skipped
        )
    }

    /// Whether `self -> next` is an edge of the state machine.
    pub fn can_transition_to(self, next: TaskRunState) -> bool {
        use TaskRunState::*;

        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Skipped)
                | (Running, Success)
                | (Running, Failed)
                | (Running, Retrying)
                | (Running, Skipped)
                | (Retrying, Running)
                | (Retrying, Skipped)
        )
    }
}

impl fmt::Display for TaskRunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskRunState::Pending => "pending",
            TaskRunState::Running => "running",
            TaskRunState::Retrying => "retrying",
            TaskRunState::Success => "success",
            TaskRunState::Failed => "failed",
            TaskRunState::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Overall state of a FlowRun, derived from its TaskRuns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowRunState {
    Running,
    /// Every TaskRun reached `Success`.
    Completed,
    /// At least one TaskRun ended `Failed` or `Skipped`.
    Failed,
    /// The run was cancelled before every TaskRun was terminal.
    Cancelled,
}

impl fmt::Display for FlowRunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FlowRunState::Running => "running",
            FlowRunState::Completed => "completed",
            FlowRunState::Failed => "failed",
            FlowRunState::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Backoff schedule selected in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    /// Retry immediately.
    None,
    /// Same delay before every retry.
    Fixed,
    /// `delay * multiplier^(attempt - 1)`, capped at `max_delay`.
    Exponential,
    /// Exponential plus symmetric random jitter.
    ExponentialJitter,
}

impl Default for BackoffKind {
    fn default() -> Self {
        BackoffKind::Fixed
    }
}

impl FromStr for BackoffKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(BackoffKind::None),
            "fixed" => Ok(BackoffKind::Fixed),
            "exponential" => Ok(BackoffKind::Exponential),
            "exponential_jitter" => Ok(BackoffKind::ExponentialJitter),
            other => Err(format!(
                "invalid backoff: {other} (expected \"none\", \"fixed\", \"exponential\" or \"exponential_jitter\")"
            )),
        }
    }
}

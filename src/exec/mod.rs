// src/exec/mod.rs

//! Task execution layer.
//!
//! - [`task_runner`] runs one dispatched TaskRun to a terminal state: input
//!   resolution, attempts, retry backoff, panic capture and cancellation.
//! - [`backend`] provides the `ExecutorBackend` trait and the default
//!   `TokioBackend` that the runtime uses, and which tests can wrap.

pub mod backend;
pub mod task_runner;

pub use backend::{ExecutorBackend, TokioBackend};
pub use task_runner::{execute, TaskJob};

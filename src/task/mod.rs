// src/task/mod.rs

//! Task definitions.
//!
//! - [`Task`] wraps a named computation `(TaskContext, Vec<Value>) -> Value`.
//! - [`retry`] holds the [`RetryPolicy`] / [`Backoff`] attached to tasks.
//! - [`context`] holds the [`TaskContext`] passed to every invocation.

pub mod context;
pub mod retry;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::anyhow;

use crate::types::Value;

pub use context::TaskContext;
pub use retry::{Backoff, RetryPolicy};

/// Boxed future produced by a task computation.
pub type TaskFuture = Pin<Box<dyn Future<Output = anyhow::Result<Value>> + Send + 'static>>;

type Computation = Arc<dyn Fn(TaskContext, Vec<Value>) -> TaskFuture + Send + Sync>;

/// A named unit of work.
///
/// Cloning a `Task` is cheap; clones share the same computation. Flows refer
/// to tasks by value, so the same `Task` can be used in several flows.
///
/// The computation may be invoked more than once (once per attempt, and once
/// per flow run). It must be safe to re-run; `TaskContext::attempt` tells it
/// which attempt it is on.
#[derive(Clone)]
pub struct Task {
    name: Arc<str>,
    computation: Computation,
    retry: Option<RetryPolicy>,
}

impl Task {
    /// Wrap an async computation.
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(TaskContext, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        let computation: Computation = Arc::new(move |ctx, inputs| Box::pin(f(ctx, inputs)));
        Self {
            name: Arc::from(name.into()),
            computation,
            retry: None,
        }
    }

    /// Wrap a synchronous computation. It runs on tokio's blocking pool so
    /// it may block freely.
    pub fn from_fn<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&TaskContext, &[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Self::new(name, move |ctx, inputs| {
            let f = Arc::clone(&f);
            async move {
                match tokio::task::spawn_blocking(move || f(&ctx, &inputs)).await {
                    Ok(result) => result,
                    // Re-raise so the executor reports it as a panic.
                    Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                    Err(err) => Err(anyhow!("blocking computation aborted: {err}")),
                }
            }
        })
    }

    /// Attach a retry policy. Configuration may still override it per task
    /// name.
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn retry_policy(&self) -> Option<&RetryPolicy> {
        self.retry.as_ref()
    }

    pub(crate) fn invoke(&self, ctx: TaskContext, inputs: Vec<Value>) -> TaskFuture {
        (self.computation)(ctx, inputs)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

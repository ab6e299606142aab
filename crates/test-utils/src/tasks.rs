#![allow(dead_code)]

//! Task factories for tests. Factories that return a [`CallCounter`] count
//! every invocation of the computation (one per attempt).

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::anyhow;
use dagflow::{Task, Value};

/// Number of times a task computation has been invoked.
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Always returns `value`.
pub fn constant_task(name: &str, value: impl Into<Value>) -> Task {
    let value = value.into();
    Task::new(name, move |_ctx, _inputs| {
        let value = value.clone();
        async move { Ok(value) }
    })
}

/// Returns `value` and counts invocations.
pub fn counting_task(name: &str, value: impl Into<Value>) -> (Task, CallCounter) {
    let value = value.into();
    let counter = CallCounter::new();
    let c = counter.clone();
    let task = Task::new(name, move |_ctx, _inputs| {
        c.bump();
        let value = value.clone();
        async move { Ok(value) }
    });
    (task, counter)
}

/// Always fails with `message`.
pub fn failing_task(name: &str, message: &str) -> (Task, CallCounter) {
    let message = message.to_string();
    let counter = CallCounter::new();
    let c = counter.clone();
    let task = Task::new(name, move |_ctx, _inputs| {
        c.bump();
        let message = message.clone();
        async move { Err(anyhow!(message)) }
    });
    (task, counter)
}

/// Fails the first `failures` invocations, then returns `value`.
pub fn flaky_task(name: &str, failures: usize, value: impl Into<Value>) -> (Task, CallCounter) {
    let value = value.into();
    let counter = CallCounter::new();
    let c = counter.clone();
    let task = Task::new(name, move |_ctx, _inputs| {
        let n = c.bump();
        let value = value.clone();
        async move {
            if n <= failures {
                Err(anyhow!("flaky failure #{n}"))
            } else {
                Ok(value)
            }
        }
    });
    (task, counter)
}

/// Sleeps for `millis`, then returns `value`. Ignores cancellation.
pub fn sleeping_task(name: &str, millis: u64, value: impl Into<Value>) -> Task {
    let value = value.into();
    Task::new(name, move |_ctx, _inputs| {
        let value = value.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(millis)).await;
            Ok(value)
        }
    })
}

/// Waits until the run is cancelled (or `millis` elapse) and propagates the
/// cancellation through a checkpoint.
pub fn cancellable_task(name: &str, millis: u64) -> (Task, CallCounter) {
    let counter = CallCounter::new();
    let c = counter.clone();
    let task = Task::new(name, move |ctx, _inputs| {
        c.bump();
        async move {
            tokio::select! {
                _ = ctx.cancelled() => {}
                _ = tokio::time::sleep(Duration::from_millis(millis)) => {}
            }
            ctx.checkpoint()?;
            Ok(Value::from("finished"))
        }
    });
    (task, counter)
}

/// Joins its string inputs with `sep`.
pub fn join_task(name: &str, sep: &str) -> Task {
    let sep = sep.to_string();
    Task::new(name, move |_ctx, inputs| {
        let sep = sep.clone();
        async move {
            let parts: Vec<String> = inputs
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect();
            Ok(Value::from(parts.join(&sep)))
        }
    })
}

/// Panics with `message`.
pub fn panicking_task(name: &str, message: &'static str) -> (Task, CallCounter) {
    let counter = CallCounter::new();
    let c = counter.clone();
    let task = Task::new(name, move |_ctx, _inputs| {
        c.bump();
        async move {
            if true {
                panic!("{message}");
            }
            Ok(Value::Null)
        }
    });
    (task, counter)
}

/// Returns the attempt number it ran on.
pub fn attempt_reporting_task(name: &str) -> Task {
    Task::new(name, |ctx, _inputs| async move { Ok(Value::from(ctx.attempt())) })
}

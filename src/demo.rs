// src/demo.rs

//! Built-in flows run by the `dagflow` binary.

use anyhow::Context;

use crate::cli::DemoFlow;
use crate::engine::Flow;
use crate::task::Task;
use crate::types::Value;

/// Returns the fixed parameter `"world"`.
pub fn get_param_task() -> Task {
    Task::from_fn("get_param", |_ctx, _inputs| Ok(Value::from("world")))
}

/// Returns `"Hello, {param}!"`. The binary prints the flow result.
pub fn hello_task() -> Task {
    Task::from_fn("hello", |_ctx, inputs| {
        let param = inputs
            .first()
            .context("hello expects one input")?;
        let name = match param {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Ok(Value::from(format!("Hello, {name}!")))
    })
}

/// `hello(get_param())`.
pub fn hello_flow() -> Flow {
    let get_param = get_param_task();
    let hello = hello_task();
    Flow::new("hello_flow", move |t| {
        let param = t.call(&get_param, []);
        t.call(&hello, [param])
    })
}

/// `hello(param)` for the flow's first argument.
pub fn hello_param_flow() -> Flow {
    let hello = hello_task();
    Flow::new("hello_param_flow", move |t| {
        let param = t.arg(0);
        t.call(&hello, [param])
    })
}

pub fn flow_for(which: DemoFlow) -> Flow {
    match which {
        DemoFlow::Hello => hello_flow(),
        DemoFlow::HelloParam => hello_param_flow(),
    }
}

/// Turn CLI strings into flow arguments: valid JSON is taken as JSON,
/// anything else as a plain string.
pub fn parse_args(args: &[String]) -> Vec<Value> {
    args.iter()
        .map(|a| serde_json::from_str(a).unwrap_or_else(|_| Value::String(a.clone())))
        .collect()
}

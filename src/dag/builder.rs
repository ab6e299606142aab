// src/dag/builder.rs

//! Graph construction: explicit ([`GraphBuilder`]) and traced ([`Tracer`]).

use std::collections::HashMap;

use tracing::trace;

use crate::dag::graph::DependencyGraph;
use crate::errors::GraphError;
use crate::task::Task;
use crate::types::Value;

/// Where a task input (or a flow output) comes from.
///
/// During tracing, `Tracer::call` returns a `Binding::Task` placeholder for
/// the value the task will produce; passing it to a later call records an
/// edge.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    /// Output of the task node with this name.
    Task(String),
    /// Positional flow invocation argument.
    Argument(usize),
    /// Literal value fixed at definition time.
    Constant(Value),
    /// JSON array assembled from nested bindings.
    List(Vec<Binding>),
}

impl Binding {
    pub fn constant(value: impl Into<Value>) -> Self {
        Binding::Constant(value.into())
    }

    pub fn list(items: impl IntoIterator<Item = Binding>) -> Self {
        Binding::List(items.into_iter().collect())
    }

    /// Reference another task node by name (explicit wiring).
    pub fn task(name: impl Into<String>) -> Self {
        Binding::Task(name.into())
    }
}

/// Node declaration before name resolution.
#[derive(Debug, Clone)]
pub(crate) struct NodeSpec {
    pub(crate) name: String,
    pub(crate) task: Task,
    pub(crate) inputs: Vec<Binding>,
}

/// Explicit graph construction.
///
/// Nodes may reference nodes declared later, so unlike tracing this can
/// express cycles; [`GraphBuilder::build`] rejects them with
/// [`GraphError::Cycle`].
///
/// ```
/// use dagflow::dag::{Binding, GraphBuilder};
/// use dagflow::Task;
///
/// let fetch = Task::new("fetch", |_ctx, _inputs| async { Ok("world".into()) });
/// let greet = Task::new("greet", |_ctx, inputs| async move {
///     Ok(format!("Hello, {}!", inputs[0].as_str().unwrap_or_default()).into())
/// });
///
/// let mut builder = GraphBuilder::new();
/// builder
///     .add(&fetch, vec![])
///     .add(&greet, vec![Binding::task("fetch")]);
/// let graph = builder.build().unwrap();
/// assert_eq!(graph.len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct GraphBuilder {
    nodes: Vec<NodeSpec>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Add a node named after the task.
    pub fn add(&mut self, task: &Task, inputs: Vec<Binding>) -> &mut Self {
        self.add_named(task.name(), task, inputs)
    }

    /// Add a node under an explicit name.
    pub fn add_named(
        &mut self,
        name: impl Into<String>,
        task: &Task,
        inputs: Vec<Binding>,
    ) -> &mut Self {
        self.nodes.push(NodeSpec {
            name: name.into(),
            task: task.clone(),
            inputs,
        });
        self
    }

    /// Add a node whose inputs are the outputs of `deps`, in order.
    pub fn after(&mut self, task: &Task, deps: &[&str]) -> &mut Self {
        let inputs = deps.iter().map(|d| Binding::task(*d)).collect();
        self.add(task, inputs)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn build(self) -> Result<DependencyGraph, GraphError> {
        DependencyGraph::build(self.nodes)
    }
}

/// Recording context handed to a flow recipe during tracing.
///
/// Calling a task through the tracer does not run it: it records a node and
/// its input edges and returns a placeholder [`Binding`] standing for the
/// task's future output.
#[derive(Debug, Default)]
pub struct Tracer {
    builder: GraphBuilder,
    calls: HashMap<String, usize>,
}

impl Tracer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Placeholder for the `index`-th flow argument.
    pub fn arg(&mut self, index: usize) -> Binding {
        Binding::Argument(index)
    }

    /// Record a call of `task` with the given inputs.
    ///
    /// The first call of a task keeps its name; later calls of the same task
    /// become `"{name}-1"`, `"{name}-2"`, ...
    pub fn call<I>(&mut self, task: &Task, inputs: I) -> Binding
    where
        I: IntoIterator<Item = Binding>,
    {
        let count = self.calls.entry(task.name().to_string()).or_insert(0);
        let name = if *count == 0 {
            task.name().to_string()
        } else {
            format!("{}-{}", task.name(), count)
        };
        *count += 1;

        let inputs: Vec<Binding> = inputs.into_iter().collect();
        trace!(task = %name, inputs = inputs.len(), "traced task call");

        self.builder.add_named(name.clone(), task, inputs);
        Binding::Task(name)
    }

    /// Number of task calls recorded so far.
    pub fn len(&self) -> usize {
        self.builder.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builder.is_empty()
    }

    pub(crate) fn into_builder(self) -> GraphBuilder {
        self.builder
    }
}

// src/engine/flow.rs

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::ConfigFile;
use crate::dag::graph::Source;
use crate::dag::{Binding, DependencyGraph, Tracer};
use crate::errors::{FlowError, GraphError};
use crate::exec::TokioBackend;
use crate::store::{Observers, StateStore, TransitionEvent};
use crate::task::{RetryPolicy, Task};
use crate::types::{RunId, Value};

use super::flow_run::{FlowRun, FlowRunHandle};
use super::runtime::FlowRuntime;

/// Concurrency bound used when nothing else is configured.
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 4;

/// Per-flow execution options.
#[derive(Debug, Clone)]
pub struct FlowOptions {
    /// Maximum number of TaskRuns dispatched at once.
    pub concurrency_limit: usize,
    /// Policy for tasks that carry none of their own.
    pub default_retry: Option<RetryPolicy>,
    /// Overrides keyed by task or node name; these win over the task's own
    /// policy.
    pub task_retry: BTreeMap<String, RetryPolicy>,
}

impl Default for FlowOptions {
    fn default() -> Self {
        Self {
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            default_retry: None,
            task_retry: BTreeMap::new(),
        }
    }
}

impl FlowOptions {
    /// Effective policy for node `node_name` running `task`.
    ///
    /// Precedence: override for the node name, override for the task name,
    /// the task's own policy, the default policy, a single attempt.
    pub fn policy_for(&self, node_name: &str, task: &Task) -> RetryPolicy {
        self.task_retry
            .get(node_name)
            .or_else(|| self.task_retry.get(task.name()))
            .or(task.retry_policy())
            .or(self.default_retry.as_ref())
            .cloned()
            .unwrap_or_default()
    }
}

type Recipe = dyn Fn(&mut Tracer) -> Binding + Send + Sync;

/// Graph and output binding produced by tracing a recipe once.
#[derive(Debug)]
struct FlowPlan {
    graph: Arc<DependencyGraph>,
    output: Source,
    arity: usize,
}

/// A named composition of tasks with an invocation entry point.
///
/// The recipe runs once, on first use, against a [`Tracer`]: task calls
/// record nodes and edges and return placeholder bindings; the binding the
/// recipe returns designates the flow's result. The traced graph is cached
/// and shared by every later run. Clones share the cache and the observers.
///
/// ```no_run
/// # async fn demo() -> Result<(), dagflow::FlowError> {
/// use dagflow::{Flow, Task, Value};
///
/// let fetch = Task::new("fetch", |_ctx, _inputs| async { Ok(Value::from("world")) });
/// let greet = Task::new("greet", |_ctx, inputs| async move {
///     Ok(Value::from(format!("Hello, {}!", inputs[0].as_str().unwrap_or_default())))
/// });
///
/// let flow = Flow::new("hello", move |t| {
///     let name = t.call(&fetch, []);
///     t.call(&greet, [name])
/// });
/// assert_eq!(flow.invoke(vec![]).await?, Value::from("Hello, world!"));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Flow {
    name: Arc<str>,
    recipe: Arc<Recipe>,
    plan: Arc<OnceCell<Arc<FlowPlan>>>,
    options: FlowOptions,
    observers: Observers,
}

impl fmt::Debug for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flow")
            .field("name", &self.name)
            .field("traced", &self.plan.get().is_some())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Flow {
    pub fn new<F>(name: impl Into<String>, recipe: F) -> Self
    where
        F: Fn(&mut Tracer) -> Binding + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name.into()),
            recipe: Arc::new(recipe),
            plan: Arc::new(OnceCell::new()),
            options: FlowOptions::default(),
            observers: Observers::new(),
        }
    }

    pub fn with_options(mut self, options: FlowOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.options.concurrency_limit = limit.max(1);
        self
    }

    /// Apply concurrency and retry settings from a loaded config file.
    pub fn with_config(self, config: &ConfigFile) -> Self {
        self.with_options(config.flow_options())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &FlowOptions {
        &self.options
    }

    /// Receive the transition events of every later run of this flow.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<TransitionEvent> {
        self.observers.subscribe()
    }

    /// The traced graph, tracing the recipe on first call.
    pub fn graph(&self) -> Result<Arc<DependencyGraph>, GraphError> {
        self.plan().map(|p| Arc::clone(&p.graph))
    }

    /// Number of positional arguments `invoke` expects.
    pub fn arity(&self) -> Result<usize, GraphError> {
        self.plan().map(|p| p.arity)
    }

    fn plan(&self) -> Result<&Arc<FlowPlan>, GraphError> {
        self.plan.get_or_try_init(|| {
            let mut tracer = Tracer::new();
            let output = (self.recipe)(&mut tracer);
            debug!(flow = %self.name, calls = tracer.len(), "recipe traced");

            let graph = tracer.into_builder().build()?;
            let (output, output_arity) = graph.resolve_output(&output)?;
            let arity = graph.arity().max(output_arity);

            info!(flow = %self.name, tasks = graph.len(), arity, "flow graph built");

            Ok(Arc::new(FlowPlan {
                graph: Arc::new(graph),
                output,
                arity,
            }))
        })
    }

    /// Start a new run in the background.
    pub fn start(&self, args: Vec<Value>) -> Result<FlowRunHandle, FlowError> {
        let plan = Arc::clone(self.plan()?);

        if args.len() < plan.arity {
            return Err(FlowError::ArgumentCount {
                flow: self.name.to_string(),
                expected: plan.arity,
                got: args.len(),
            });
        }

        let run_id = RunId::next();
        let cancel = CancellationToken::new();
        let store = Arc::new(StateStore::new(
            run_id,
            Arc::clone(&self.name),
            &plan.graph,
            self.observers.clone(),
        ));
        let retry: Arc<[RetryPolicy]> = plan
            .graph
            .nodes()
            .map(|n| self.options.policy_for(n.name(), n.task()))
            .collect();
        let args: Arc<[Value]> = args.into();

        let runtime = FlowRuntime::new(
            Arc::clone(&store),
            Arc::clone(&plan.graph),
            Arc::clone(&args),
            retry,
            self.options.concurrency_limit,
            cancel.clone(),
            TokioBackend,
        );

        let flow = Arc::clone(&self.name);
        let join = tokio::spawn(async move {
            let state = runtime.run().await;
            FlowRun::new(
                flow,
                Arc::clone(&plan.graph),
                store,
                args,
                plan.output.clone(),
                state,
            )
        });

        Ok(FlowRunHandle::new(run_id, cancel, join))
    }

    /// Run to completion and return the whole [`FlowRun`].
    ///
    /// Dropping the returned future cancels the run.
    pub async fn invoke_run(&self, args: Vec<Value>) -> Result<FlowRun, FlowError> {
        let handle = self.start(args)?;
        let _guard = handle.cancellation_token().drop_guard();
        handle.join().await
    }

    /// Run to completion and return the terminal binding's value.
    pub async fn invoke(&self, args: Vec<Value>) -> Result<Value, FlowError> {
        self.invoke_run(args).await?.result()
    }
}

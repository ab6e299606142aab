// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dag::graph::Source;
use crate::dag::{DependencyGraph, NodeId, Scheduler, SchedulerStep};
use crate::errors::{CancellationError, TaskExecutionError};
use crate::exec::{ExecutorBackend, TaskJob, TokioBackend};
use crate::store::{Observers, StateStore, Transition};
use crate::task::RetryPolicy;
use crate::types::{FlowRunState, RunId, TaskRunState, Value};

use super::flow_run::FlowRun;
use super::RunEvent;

/// Drives one flow run: feeds executor completions into the pure
/// [`Scheduler`], writes the resulting `Skipped` transitions and hands
/// dispatched nodes to an [`ExecutorBackend`].
///
/// This is the only async part of scheduling; every decision is made by the
/// scheduler.
pub struct FlowRuntime<E: ExecutorBackend = TokioBackend> {
    scheduler: Scheduler,
    store: Arc<StateStore>,
    args: Arc<[Value]>,
    retry: Arc<[RetryPolicy]>,
    cancel: CancellationToken,
    backend: E,
    events_tx: mpsc::UnboundedSender<RunEvent>,
    events_rx: mpsc::UnboundedReceiver<RunEvent>,
}

impl<E: ExecutorBackend> fmt::Debug for FlowRuntime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowRuntime")
            .field("run_id", &self.store.run_id())
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> FlowRuntime<E> {
    /// `retry` holds the effective policy of every node, indexed by `NodeId`.
    pub fn new(
        store: Arc<StateStore>,
        graph: Arc<DependencyGraph>,
        args: Arc<[Value]>,
        retry: Arc<[RetryPolicy]>,
        concurrency_limit: usize,
        cancel: CancellationToken,
        backend: E,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            scheduler: Scheduler::new(graph, concurrency_limit),
            store,
            args,
            retry,
            cancel,
            backend,
            events_tx,
            events_rx,
        }
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// Main event loop. Returns once every TaskRun is terminal.
    pub async fn run(mut self) -> FlowRunState {
        let run_id = self.store.run_id();
        info!(
            flow = %self.store.flow_name(),
            %run_id,
            tasks = self.store.len(),
            limit = self.scheduler.limit(),
            "flow run started"
        );

        let step = self.scheduler.start();
        self.apply(step);

        while !self.scheduler.is_finished() {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled(), if !self.scheduler.is_cancelled() => {
                    info!(%run_id, in_flight = self.scheduler.in_flight(), "cancellation requested");
                    let step = self.scheduler.cancel();
                    self.apply(step);
                }

                event = self.events_rx.recv() => match event {
                    Some(RunEvent::TaskFinished { node, outcome }) => {
                        debug!(
                            %run_id,
                            task = %self.scheduler.graph().node(node).name(),
                            ?outcome,
                            "task finished"
                        );
                        let step = self.scheduler.step_completion(node, outcome);
                        self.apply(step);
                    }
                    None => {
                        warn!(%run_id, "runtime event channel closed; exiting");
                        break;
                    }
                },
            }
        }

        let state = self.final_state();
        info!(flow = %self.store.flow_name(), %run_id, %state, "flow run finished");
        state
    }

    /// Apply one scheduler step: record skips first, then spawn executors.
    fn apply(&mut self, step: SchedulerStep) {
        let cause = self.scheduler.is_cancelled().then(|| {
            Arc::new(TaskExecutionError::Cancelled(CancellationError {
                run_id: self.store.run_id(),
            }))
        });

        for id in step.newly_skipped {
            if let Err(err) = self.store.transition(id, Transition::Skip { cause: cause.clone() }) {
                warn!(run_id = %self.store.run_id(), error = %err, "could not record skip");
            }
        }

        for id in step.newly_dispatched {
            let job = self.job_for(id);
            self.backend.spawn_job(job, self.events_tx.clone());
        }
    }

    fn job_for(&self, node: NodeId) -> TaskJob {
        TaskJob {
            node,
            graph: Arc::clone(self.scheduler.graph()),
            store: Arc::clone(&self.store),
            args: Arc::clone(&self.args),
            policy: self.retry[node.index()].clone(),
            cancel: self.cancel.clone(),
        }
    }

    fn final_state(&self) -> FlowRunState {
        if self.scheduler.is_cancelled() {
            return FlowRunState::Cancelled;
        }

        let all_succeeded = self
            .scheduler
            .graph()
            .nodes()
            .all(|n| self.store.state_of(n.id()) == TaskRunState::Success);

        if all_succeeded {
            FlowRunState::Completed
        } else {
            FlowRunState::Failed
        }
    }
}

/// Run a graph once with each task's own retry policy.
///
/// The run's result is the output of the graph's only sink, or a list of the
/// outputs of all sinks (in declaration order) when there are several.
pub async fn run_graph(
    graph: Arc<DependencyGraph>,
    args: Vec<Value>,
    concurrency_limit: usize,
) -> FlowRun {
    let run_id = RunId::next();
    let flow: Arc<str> = Arc::from("graph");
    let store = Arc::new(StateStore::new(
        run_id,
        Arc::clone(&flow),
        &graph,
        Observers::new(),
    ));

    let retry: Arc<[RetryPolicy]> = graph
        .nodes()
        .map(|n| n.task().retry_policy().cloned().unwrap_or_default())
        .collect();

    let mut sinks: Vec<Source> = graph.sinks().map(Source::Task).collect();
    let output = match sinks.len() {
        0 => Source::Constant(Value::Null),
        1 => sinks.remove(0),
        _ => Source::List(sinks),
    };

    let args: Arc<[Value]> = args.into();
    let runtime = FlowRuntime::new(
        Arc::clone(&store),
        Arc::clone(&graph),
        Arc::clone(&args),
        retry,
        concurrency_limit,
        CancellationToken::new(),
        TokioBackend,
    );
    let state = runtime.run().await;

    FlowRun::new(flow, graph, store, args, output, state)
}

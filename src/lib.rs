// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod demo;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod store;
pub mod task;
pub mod types;

use anyhow::Result;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::load_or_default;

pub use crate::dag::{Binding, DependencyGraph, GraphBuilder, Tracer};
pub use crate::engine::{run_graph, Flow, FlowOptions, FlowRun, FlowRunHandle};
pub use crate::errors::{
    CancellationError, CycleError, DagflowError, FlowError, GraphError, TaskExecutionError,
};
pub use crate::store::{TaskRunRecord, TransitionEvent, TransitionOutcome};
pub use crate::task::{Backoff, RetryPolicy, Task, TaskContext};
pub use crate::types::{FlowRunState, RunId, TaskRunState, Value};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the selected built-in flow
/// - a transition observer that logs every state change
/// - Ctrl-C handling (cancels the run)
pub async fn run(args: CliArgs) -> Result<()> {
    let config = load_or_default(args.config.as_deref())?;

    let mut options = config.flow_options();
    if let Some(limit) = args.concurrency {
        options.concurrency_limit = usize::try_from(limit).unwrap_or(usize::MAX);
    }
    let flow = demo::flow_for(args.flow).with_options(options);

    if args.dry_run {
        print_dry_run(&flow)?;
        return Ok(());
    }

    let (done_tx, done_rx) = oneshot::channel();
    let observer = tokio::spawn(log_transitions(flow.subscribe(), done_rx));

    let handle = flow.start(demo::parse_args(&args.args))?;

    // Ctrl-C → cooperative cancellation.
    {
        let cancel = handle.cancellation_token();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            info!("Ctrl+C received; cancelling flow run");
            cancel.cancel();
        });
    }

    let flow_run = handle.join().await?;
    let _ = done_tx.send(());
    let _ = observer.await;

    info!(
        flow = %flow_run.flow_name(),
        run_id = %flow_run.run_id(),
        state = %flow_run.state(),
        "flow finished"
    );

    match flow_run.result()? {
        Value::String(s) => println!("{s}"),
        other => println!("{other}"),
    }
    Ok(())
}

/// Log every transition until `done` fires, then drain what is left.
async fn log_transitions(
    mut events: mpsc::UnboundedReceiver<TransitionEvent>,
    mut done: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            Some(event) = events.recv() => log_transition(&event),
            _ = &mut done => {
                while let Ok(event) = events.try_recv() {
                    log_transition(&event);
                }
                break;
            }
        }
    }
}

fn log_transition(event: &TransitionEvent) {
    info!(
        flow = %event.flow,
        run_id = %event.run_id,
        task = %event.task,
        attempt = event.attempt,
        from = %event.from,
        to = %event.to,
        "task state changed"
    );
}

/// Dry-run output: trace the flow and print its layers.
fn print_dry_run(flow: &Flow) -> Result<()> {
    let graph = flow.graph()?;

    println!("dagflow dry-run: {}", flow.name());
    println!("  concurrency_limit = {}", flow.options().concurrency_limit);
    println!("  arguments = {}", flow.arity()?);
    println!();

    for (depth, layer) in graph.topological_layers().enumerate() {
        println!("layer {depth}:");
        for id in layer {
            let node = graph.node(id);
            let deps: Vec<&str> = node
                .dependencies()
                .iter()
                .map(|d| graph.node(*d).name())
                .collect();
            let policy = flow.options().policy_for(node.name(), node.task());

            println!("  - {}", node.name());
            if !deps.is_empty() {
                println!("      after: {deps:?}");
            }
            if policy.max_attempts() > 1 {
                println!("      max_attempts: {}", policy.max_attempts());
                println!("      backoff: {:?}", policy.backoff());
            }
        }
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}

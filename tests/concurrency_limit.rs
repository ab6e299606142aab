// tests/concurrency_limit.rs

mod common;
use crate::common::observe::{drain, max_concurrent_running};
use crate::common::tasks::sleeping_task;
use crate::common::{init_tracing, with_timeout};

use std::sync::Arc;
use std::time::Duration;

use dagflow::dag::{Binding, GraphBuilder};
use dagflow::engine::FlowRuntime;
use dagflow::store::{Observers, StateStore};
use dagflow::types::{FlowRunState, RunId};
use dagflow::{run_graph, Flow, RetryPolicy, Task, Value};
use dagflow_test_utils::recording_backend::RecordingBackend;
use tokio_util::sync::CancellationToken;

fn five_slow_tasks() -> Vec<Task> {
    (0..5)
        .map(|i| sleeping_task(&format!("slow{i}"), 50, i))
        .collect()
}

#[tokio::test]
async fn never_more_than_limit_tasks_running() {
    init_tracing();

    let tasks = five_slow_tasks();
    let flow = Flow::new("bounded", move |t| {
        let outs: Vec<Binding> = tasks.iter().map(|task| t.call(task, [])).collect();
        Binding::list(outs)
    })
    .with_concurrency_limit(2);
    let mut events = flow.subscribe();

    let value = with_timeout(flow.invoke(vec![])).await.unwrap();

    assert_eq!(value, serde_json::json!([0, 1, 2, 3, 4]));
    let events = drain(&mut events);
    assert_eq!(max_concurrent_running(&events), 2);
}

#[tokio::test]
async fn limit_of_one_runs_sequentially_in_declaration_order() {
    init_tracing();

    let mut builder = GraphBuilder::new();
    for task in five_slow_tasks() {
        builder.add(&task, vec![]);
    }
    let graph = Arc::new(builder.build().unwrap());

    let store = Arc::new(StateStore::new(
        RunId::next(),
        Arc::from("sequential"),
        &graph,
        Observers::new(),
    ));
    let backend = RecordingBackend::new();
    let log = backend.log();
    let retry: Arc<[RetryPolicy]> = graph.nodes().map(|_| RetryPolicy::default()).collect();

    let runtime = FlowRuntime::new(
        Arc::clone(&store),
        Arc::clone(&graph),
        Arc::from(Vec::<Value>::new()),
        retry,
        1,
        CancellationToken::new(),
        backend,
    );
    let state = with_timeout(runtime.run()).await;

    assert_eq!(state, FlowRunState::Completed);
    assert_eq!(
        *log.lock().unwrap(),
        vec!["slow0", "slow1", "slow2", "slow3", "slow4"]
    );
    assert_eq!(max_concurrent_running(&store.transitions()), 1);
}

#[tokio::test]
async fn independent_tasks_overlap_when_allowed() {
    init_tracing();

    let mut builder = GraphBuilder::new();
    for task in five_slow_tasks() {
        builder.add(&task, vec![]);
    }
    let graph = Arc::new(builder.build().unwrap());

    let started = std::time::Instant::now();
    let run = with_timeout(run_graph(graph, vec![], 5)).await;

    assert_eq!(run.state(), FlowRunState::Completed);
    // Five 50ms sleeps in parallel take well under their 250ms sum.
    assert!(started.elapsed() < Duration::from_millis(200));
    assert_eq!(max_concurrent_running(&run.transitions()), 5);
    assert_eq!(run.result().unwrap(), serde_json::json!([0, 1, 2, 3, 4]));
}

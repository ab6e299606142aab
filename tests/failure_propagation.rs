// tests/failure_propagation.rs

mod common;
use crate::common::observe::drain;
use crate::common::tasks::{constant_task, counting_task, failing_task, join_task};
use crate::common::{init_tracing, with_timeout};

use dagflow::dag::Binding;
use dagflow::types::TaskRunState;
use dagflow::{Flow, FlowError, FlowRunState, TaskExecutionError, Value};

#[tokio::test]
async fn failed_task_skips_dependents_but_not_independent_branches() {
    init_tracing();

    let (a, _a_calls) = failing_task("A", "A exploded");
    let (c, c_calls) = counting_task("C", "c");
    let (d, d_calls) = counting_task("D", "d");

    let flow = Flow::new("isolation", move |t| {
        let a_out = t.call(&a, []);
        let c_out = t.call(&c, [a_out]);
        let d_out = t.call(&d, []);
        Binding::list([c_out, d_out])
    });
    let mut events = flow.subscribe();

    let run = with_timeout(flow.invoke_run(vec![])).await.unwrap();

    assert_eq!(run.state(), FlowRunState::Failed);
    assert_eq!(c_calls.count(), 0, "C must never be invoked");
    assert_eq!(d_calls.count(), 1);

    assert_eq!(run.task_run("A").unwrap().state, TaskRunState::Failed);
    assert_eq!(run.task_run("C").unwrap().state, TaskRunState::Skipped);
    assert_eq!(run.task_run("D").unwrap().state, TaskRunState::Success);
    assert_eq!(run.output_of("D").unwrap(), Value::from("d"));

    // C goes straight from Pending to Skipped.
    let c_events: Vec<_> = drain(&mut events)
        .into_iter()
        .filter(|e| e.task == "C")
        .collect();
    assert_eq!(c_events.len(), 1);
    assert_eq!(c_events[0].from, TaskRunState::Pending);
    assert_eq!(c_events[0].to, TaskRunState::Skipped);
}

#[tokio::test]
async fn error_carries_the_chain_to_the_origin() {
    init_tracing();

    let root = constant_task("root", "r");
    let (bad, _) = failing_task("bad", "disk on fire");
    let mid = join_task("mid", "+");
    let last = join_task("last", "+");

    let flow = Flow::new("chain", move |t| {
        let r = t.call(&root, []);
        let b = t.call(&bad, [r.clone()]);
        let m = t.call(&mid, [r, b]);
        t.call(&last, [m])
    });

    let err = with_timeout(flow.invoke(vec![])).await.unwrap_err();

    match &err {
        FlowError::UpstreamFailed { task, path, origin, cause } => {
            assert_eq!(task, "last");
            assert_eq!(path, &vec!["last", "mid", "bad"]);
            assert_eq!(origin, "bad");
            assert!(cause.to_string().contains("disk on fire"));
        }
        other => panic!("expected UpstreamFailed, got {other:?}"),
    }
    assert_eq!(err.failure_chain(), vec!["last", "mid", "bad"]);
    assert!(matches!(err.cause(), Some(TaskExecutionError::Failed(_))));
}

#[tokio::test]
async fn every_failed_task_keeps_its_last_cause() {
    init_tracing();

    let (x, _) = failing_task("x", "x broke");
    let (y, _) = failing_task("y", "y broke");
    let flow = Flow::new("two_failures", move |t| {
        let a = t.call(&x, []);
        let b = t.call(&y, []);
        Binding::list([a, b])
    });

    let run = with_timeout(flow.invoke_run(vec![])).await.unwrap();

    for (name, msg) in [("x", "x broke"), ("y", "y broke")] {
        let record = run.task_run(name).unwrap();
        assert_eq!(record.state, TaskRunState::Failed);
        assert!(record.finished_at.is_some());
        assert!(record.cause.unwrap().to_string().contains(msg));
    }
}

#[tokio::test]
async fn missing_argument_is_rejected_before_running() {
    init_tracing();

    let (echo, calls) = counting_task("echo", "unused");
    let flow = Flow::new("needs_two", move |t| {
        let a = t.arg(0);
        let b = t.arg(1);
        t.call(&echo, [a, b])
    });

    let err = flow.invoke(vec![Value::from(1)]).await.unwrap_err();
    assert!(matches!(
        err,
        FlowError::ArgumentCount { expected: 2, got: 1, .. }
    ));
    assert_eq!(calls.count(), 0);
}

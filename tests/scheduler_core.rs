// tests/scheduler_core.rs
//
// Drives the pure scheduler by hand, without tokio or executors.

mod common;
use crate::common::tasks::constant_task;
use crate::common::{graph_of, init_tracing};

use std::sync::Arc;

use dagflow::dag::{DependencyGraph, NodeId, ScheduleState, Scheduler};
use dagflow::engine::TaskOutcome;

fn names(graph: &DependencyGraph, ids: &[NodeId]) -> Vec<String> {
    ids.iter().map(|id| graph.node(*id).name().to_string()).collect()
}

/// A -> B -> D, A -> C -> D, plus an independent E.
fn diamond_plus_one() -> Arc<DependencyGraph> {
    let a = constant_task("A", 0);
    let b = constant_task("B", 0);
    let c = constant_task("C", 0);
    let d = constant_task("D", 0);
    let e = constant_task("E", 0);
    Arc::new(graph_of(&[
        (&a, &[]),
        (&b, &["A"]),
        (&c, &["A"]),
        (&d, &["B", "C"]),
        (&e, &[]),
    ]))
}

#[test]
fn dispatches_roots_then_dependents_as_they_become_ready() {
    init_tracing();
    let graph = diamond_plus_one();
    let id = |n: &str| graph.id_of(n).unwrap();
    let mut scheduler = Scheduler::new(Arc::clone(&graph), 10);

    let step = scheduler.start();
    assert_eq!(names(&graph, &step.newly_dispatched), vec!["A", "E"]);
    assert!(step.newly_skipped.is_empty());
    assert!(!step.run_just_finished);

    let step = scheduler.step_completion(id("A"), TaskOutcome::Success);
    assert_eq!(names(&graph, &step.newly_dispatched), vec!["B", "C"]);

    // D waits for both B and C.
    let step = scheduler.step_completion(id("B"), TaskOutcome::Success);
    assert!(step.newly_dispatched.is_empty());
    assert_eq!(scheduler.state_of(id("D")), ScheduleState::Waiting);

    let step = scheduler.step_completion(id("C"), TaskOutcome::Success);
    assert_eq!(names(&graph, &step.newly_dispatched), vec!["D"]);

    scheduler.step_completion(id("D"), TaskOutcome::Success);
    let step = scheduler.step_completion(id("E"), TaskOutcome::Success);
    assert!(step.run_just_finished);
    assert!(scheduler.is_finished());
    assert_eq!(scheduler.in_flight(), 0);
}

#[test]
fn dependents_do_not_wait_for_unrelated_tasks_in_their_layer() {
    init_tracing();
    // A -> B, and a slow root S in A's layer.
    let a = constant_task("A", 0);
    let b = constant_task("B", 0);
    let s = constant_task("S", 0);
    let graph = Arc::new(graph_of(&[(&a, &[]), (&s, &[]), (&b, &["A"])]));
    let mut scheduler = Scheduler::new(Arc::clone(&graph), 4);

    scheduler.start();
    let step = scheduler.step_completion(graph.id_of("A").unwrap(), TaskOutcome::Success);

    // S is still in flight but B is dispatched anyway.
    assert_eq!(names(&graph, &step.newly_dispatched), vec!["B"]);
    assert_eq!(
        scheduler.state_of(graph.id_of("S").unwrap()),
        ScheduleState::Dispatched
    );
}

#[test]
fn failure_skips_transitive_dependents_only() {
    init_tracing();
    let graph = diamond_plus_one();
    let id = |n: &str| graph.id_of(n).unwrap();
    let mut scheduler = Scheduler::new(Arc::clone(&graph), 10);

    scheduler.start();
    let step = scheduler.step_completion(id("A"), TaskOutcome::Failed);

    assert_eq!(names(&graph, &step.newly_skipped), vec!["B", "C", "D"]);
    assert!(step.newly_dispatched.is_empty());
    assert_eq!(
        scheduler.state_of(id("D")),
        ScheduleState::Done(TaskOutcome::Skipped)
    );

    // E is independent and still runs to completion.
    let step = scheduler.step_completion(id("E"), TaskOutcome::Success);
    assert!(step.run_just_finished);
}

#[test]
fn concurrency_limit_holds_back_ready_tasks() {
    init_tracing();
    let tasks: Vec<_> = (0..5).map(|i| constant_task(&format!("t{i}"), i)).collect();
    let specs: Vec<_> = tasks.iter().map(|t| (t, &[] as &[&str])).collect();
    let graph = Arc::new(graph_of(&specs));
    let mut scheduler = Scheduler::new(Arc::clone(&graph), 2);

    let step = scheduler.start();
    assert_eq!(names(&graph, &step.newly_dispatched), vec!["t0", "t1"]);
    assert_eq!(scheduler.in_flight(), 2);

    let step = scheduler.step_completion(graph.id_of("t1").unwrap(), TaskOutcome::Success);
    assert_eq!(names(&graph, &step.newly_dispatched), vec!["t2"]);
    assert_eq!(scheduler.in_flight(), 2);
}

#[test]
fn zero_limit_is_clamped_to_one() {
    let a = constant_task("A", 0);
    let b = constant_task("B", 0);
    let graph = Arc::new(graph_of(&[(&a, &[]), (&b, &[])]));
    let mut scheduler = Scheduler::new(graph, 0);

    assert_eq!(scheduler.limit(), 1);
    assert_eq!(scheduler.start().newly_dispatched.len(), 1);
}

#[test]
fn cancel_skips_everything_not_yet_dispatched() {
    init_tracing();
    let graph = diamond_plus_one();
    let id = |n: &str| graph.id_of(n).unwrap();
    let mut scheduler = Scheduler::new(Arc::clone(&graph), 1);

    // Only A is dispatched (limit 1); E is ready but queued.
    let step = scheduler.start();
    assert_eq!(names(&graph, &step.newly_dispatched), vec!["A"]);

    let step = scheduler.cancel();
    assert_eq!(names(&graph, &step.newly_skipped), vec!["B", "C", "D", "E"]);
    assert!(!step.run_just_finished);
    assert!(scheduler.is_cancelled());

    // A second cancel is a no-op.
    assert_eq!(scheduler.cancel(), Default::default());

    // A's completion after cancellation dispatches nothing and ends the run.
    let step = scheduler.step_completion(id("A"), TaskOutcome::Skipped);
    assert!(step.newly_dispatched.is_empty());
    assert!(step.run_just_finished);
}

#[test]
fn completion_for_unknown_in_flight_task_is_ignored() {
    let graph = diamond_plus_one();
    let mut scheduler = Scheduler::new(Arc::clone(&graph), 10);
    scheduler.start();

    // D was never dispatched.
    let step = scheduler.step_completion(graph.id_of("D").unwrap(), TaskOutcome::Success);
    assert_eq!(step, Default::default());
    assert_eq!(scheduler.in_flight(), 2);
}

#[test]
fn empty_graph_is_finished_immediately() {
    let graph = Arc::new(graph_of(&[]));
    let mut scheduler = Scheduler::new(graph, 3);
    let step = scheduler.start();
    assert!(step.run_just_finished);
    assert!(step.newly_dispatched.is_empty());
}

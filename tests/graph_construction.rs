// tests/graph_construction.rs

mod common;
use crate::common::tasks::constant_task;
use crate::common::{graph_of, init_tracing, layer_names, task_ref};

use dagflow::dag::{Binding, GraphBuilder};
use dagflow::{Flow, GraphError};

#[test]
fn diamond_builds_into_three_layers() {
    init_tracing();

    let a = constant_task("A", 1);
    let b = constant_task("B", 2);
    let c = constant_task("C", 3);
    let d = constant_task("D", 4);

    let graph = graph_of(&[(&a, &[]), (&b, &["A"]), (&c, &["A"]), (&d, &["B", "C"])]);

    assert_eq!(graph.len(), 4);
    assert_eq!(
        layer_names(&graph),
        vec![vec!["A"], vec!["B", "C"], vec!["D"]]
    );

    let d_id = graph.id_of("D").unwrap();
    let deps: Vec<&str> = graph
        .dependencies_of(d_id)
        .iter()
        .map(|id| graph.node(*id).name())
        .collect();
    assert_eq!(deps, vec!["B", "C"]);
}

#[test]
fn layers_keep_declaration_order_not_name_order() {
    init_tracing();

    let z = constant_task("z", 0);
    let a = constant_task("a", 0);
    let m = constant_task("m", 0);

    let graph = graph_of(&[(&z, &[]), (&a, &[]), (&m, &["a"])]);

    assert_eq!(layer_names(&graph), vec![vec!["z", "a"], vec!["m"]]);
}

#[test]
fn every_task_appears_once_after_its_predecessors() {
    init_tracing();

    let t: Vec<_> = (0..6).map(|i| constant_task(&format!("t{i}"), i)).collect();
    let graph = graph_of(&[
        (&t[0], &[]),
        (&t[1], &["t0"]),
        (&t[2], &[]),
        (&t[3], &["t1", "t2"]),
        (&t[4], &["t0", "t3"]),
        (&t[5], &["t2"]),
    ]);

    let layers = graph.layer_indices();
    let seen: usize = graph.topological_layers().map(|l| l.len()).sum();
    assert_eq!(seen, graph.len());

    for node in graph.nodes() {
        for dep in node.dependencies() {
            assert!(layers[dep.index()] < layers[node.id().index()]);
        }
    }
}

#[test]
fn cycle_is_rejected_and_names_its_tasks() {
    init_tracing();

    let a = constant_task("A", 1);
    let b = constant_task("B", 2);
    let c = constant_task("C", 3);
    let free = constant_task("free", 0);

    let mut builder = GraphBuilder::new();
    builder
        .add(&free, vec![])
        .add(&a, vec![task_ref("C")])
        .add(&b, vec![task_ref("A")])
        .add(&c, vec![task_ref("B")]);

    match builder.build() {
        Err(GraphError::Cycle(cycle)) => {
            assert_eq!(cycle.tasks, vec!["A", "B", "C"]);
            assert!(cycle.involves("B"));
            assert!(!cycle.involves("free"));
        }
        other => panic!("expected cycle error, got {other:?}"),
    }
}

#[test]
fn self_dependency_is_a_cycle() {
    let a = constant_task("A", 1);
    let mut builder = GraphBuilder::new();
    builder.add(&a, vec![task_ref("A")]);

    let err = builder.build().unwrap_err();
    assert!(matches!(err, GraphError::Cycle(ref c) if c.tasks == vec!["A"]));
}

#[test]
fn unknown_and_duplicate_tasks_are_rejected() {
    let a = constant_task("A", 1);

    let mut builder = GraphBuilder::new();
    builder.add(&a, vec![task_ref("missing")]);
    assert_eq!(
        builder.build().unwrap_err(),
        GraphError::UnknownDependency {
            task: "A".into(),
            dependency: "missing".into()
        }
    );

    let mut builder = GraphBuilder::new();
    builder.add(&a, vec![]).add(&a, vec![]);
    assert_eq!(
        builder.build().unwrap_err(),
        GraphError::DuplicateTask("A".into())
    );
}

#[test]
fn nested_list_bindings_create_edges() {
    let a = constant_task("A", 1);
    let b = constant_task("B", 2);
    let sum = constant_task("sum", 0);

    let mut builder = GraphBuilder::new();
    builder
        .add(&a, vec![])
        .add(&b, vec![])
        .add(
            &sum,
            vec![Binding::list([task_ref("A"), Binding::constant(10), task_ref("B")])],
        );
    let graph = builder.build().unwrap();

    let sum_id = graph.id_of("sum").unwrap();
    assert_eq!(graph.dependencies_of(sum_id).len(), 2);
    assert_eq!(layer_names(&graph), vec![vec!["A", "B"], vec!["sum"]]);
}

#[test]
fn tracing_names_repeated_calls_and_counts_arguments() {
    init_tracing();

    let step = constant_task("step", 0);
    let flow = Flow::new("repeat", move |t| {
        let x = t.arg(1);
        let first = t.call(&step, [x]);
        let second = t.call(&step, [first]);
        t.call(&step, [second])
    });

    let graph = flow.graph().unwrap();
    let names: Vec<&str> = graph.nodes().map(|n| n.name()).collect();
    assert_eq!(names, vec!["step", "step-1", "step-2"]);
    assert_eq!(flow.arity().unwrap(), 2);
    assert_eq!(
        layer_names(&graph),
        vec![vec!["step"], vec!["step-1"], vec!["step-2"]]
    );
}

#[test]
fn flow_output_must_name_a_traced_task() {
    let flow = Flow::new("broken", |_t| Binding::task("nowhere"));
    assert_eq!(
        flow.graph().unwrap_err(),
        GraphError::UnknownOutput("nowhere".into())
    );
}

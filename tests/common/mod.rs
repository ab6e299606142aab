#![allow(dead_code)]

pub use dagflow_test_utils::{builders, init_tracing, observe, tasks, with_timeout};

use dagflow::dag::{Binding, DependencyGraph, GraphBuilder};
use dagflow::Task;

/// Build a graph where each `(task, deps)` pair takes the outputs of `deps`
/// as inputs, in declaration order.
pub fn graph_of(nodes: &[(&Task, &[&str])]) -> DependencyGraph {
    let mut builder = GraphBuilder::new();
    for (task, deps) in nodes {
        builder.after(task, deps);
    }
    builder.build().expect("graph should build")
}

/// Names of each layer, for readable assertions.
pub fn layer_names(graph: &DependencyGraph) -> Vec<Vec<String>> {
    graph
        .topological_layers()
        .map(|layer| {
            layer
                .into_iter()
                .map(|id| graph.node(id).name().to_string())
                .collect()
        })
        .collect()
}

pub fn task_ref(name: &str) -> Binding {
    Binding::task(name)
}

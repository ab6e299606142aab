// tests/property_scheduler.rs

use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;

use dagflow::dag::{DependencyGraph, GraphBuilder, NodeId, Scheduler};
use dagflow::engine::TaskOutcome;
use dagflow::Task;
use dagflow_test_utils::tasks::constant_task;

// Strategy to generate a random DAG.
// Acyclicity: task N may only depend on tasks 0..N-1.
fn dag_strategy(max_tasks: usize) -> impl Strategy<Value = Arc<DependencyGraph>> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        let deps_strat = proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..num_tasks),
            num_tasks,
        );

        deps_strat.prop_map(move |raw_deps| {
            let tasks: Vec<Task> = (0..raw_deps.len())
                .map(|i| constant_task(&format!("task_{i}"), i as u64))
                .collect();

            let mut builder = GraphBuilder::new();
            for (i, potential_deps) in raw_deps.into_iter().enumerate() {
                let valid: HashSet<usize> = if i > 0 {
                    potential_deps.into_iter().map(|d| d % i).collect()
                } else {
                    HashSet::new()
                };
                let mut valid: Vec<usize> = valid.into_iter().collect();
                valid.sort_unstable();

                let names: Vec<String> = valid.iter().map(|d| format!("task_{d}")).collect();
                let refs: Vec<&str> = names.iter().map(String::as_str).collect();
                builder.after(&tasks[i], &refs);
            }
            Arc::new(builder.build().expect("generated graph is acyclic"))
        })
    })
}

proptest! {
    #[test]
    fn layers_cover_every_task_once_after_predecessors(graph in dag_strategy(12)) {
        let mut seen = HashSet::new();
        let mut layer_of = vec![usize::MAX; graph.len()];

        for (depth, layer) in graph.topological_layers().enumerate() {
            for id in layer {
                prop_assert!(seen.insert(id), "task {:?} yielded twice", id);
                for dep in graph.dependencies_of(id) {
                    prop_assert!(layer_of[dep.index()] < depth);
                }
                layer_of[id.index()] = depth;
            }
        }

        prop_assert_eq!(seen.len(), graph.len());
    }

    #[test]
    fn scheduler_always_terminates(
        graph in dag_strategy(10),
        limit in 1usize..4,
        failing in proptest::collection::hash_set(0..10usize, 0..4),
    ) {
        let mut scheduler = Scheduler::new(Arc::clone(&graph), limit);
        let mut executing: Vec<NodeId> = scheduler.start().newly_dispatched;
        let mut finished: HashSet<NodeId> = HashSet::new();

        let mut steps = 0;
        while !scheduler.is_finished() {
            steps += 1;
            prop_assert!(steps <= graph.len() + 1, "scheduler did not terminate");
            prop_assert!(!executing.is_empty(), "run is stuck with nothing in flight");
            prop_assert!(scheduler.in_flight() <= limit);

            let id = executing.remove(0);

            // Every predecessor of a dispatched task has already succeeded.
            for dep in graph.dependencies_of(id) {
                prop_assert!(finished.contains(dep));
            }

            let outcome = if failing.contains(&id.index()) {
                TaskOutcome::Failed
            } else {
                finished.insert(id);
                TaskOutcome::Success
            };

            let step = scheduler.step_completion(id, outcome);
            executing.extend(step.newly_dispatched);
        }

        prop_assert!(executing.is_empty());
    }
}

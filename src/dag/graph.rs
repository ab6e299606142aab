// src/dag/graph.rs

use std::collections::HashMap;

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::dag::builder::{Binding, NodeSpec};
use crate::errors::{CycleError, GraphError};
use crate::task::Task;
use crate::types::Value;

/// Index of a node in its [`DependencyGraph`], in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A [`Binding`] with task names resolved to node ids.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Source {
    Task(NodeId),
    Argument(usize),
    Constant(Value),
    List(Vec<Source>),
}

/// One task inside a graph: its computation, its ordered inputs, and the
/// adjacency information derived from them.
#[derive(Debug)]
pub struct DagNode {
    id: NodeId,
    name: String,
    task: Task,
    inputs: Vec<Source>,
    /// Direct predecessors, deduplicated, in first-use order.
    deps: Vec<NodeId>,
    /// Direct successors, in declaration order.
    dependents: Vec<NodeId>,
}

impl DagNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn dependencies(&self) -> &[NodeId] {
        &self.deps
    }

    pub fn dependents(&self) -> &[NodeId] {
        &self.dependents
    }

    pub(crate) fn inputs(&self) -> &[Source] {
        &self.inputs
    }
}

/// Immutable directed acyclic graph of tasks.
///
/// Built once (by [`GraphBuilder`](crate::dag::GraphBuilder) or by tracing a
/// flow recipe) and then shared read-only, behind an `Arc`, by every run.
#[derive(Debug)]
pub struct DependencyGraph {
    nodes: Vec<DagNode>,
    index: HashMap<String, NodeId>,
    /// Number of flow arguments referenced by task inputs.
    arity: usize,
}

impl DependencyGraph {
    /// Build a graph from node specs in declaration order.
    ///
    /// Fails if a name is declared twice, if an input refers to an unknown
    /// task, or if the edges form a cycle.
    pub(crate) fn build(specs: Vec<NodeSpec>) -> Result<Self, GraphError> {
        let mut index: HashMap<String, NodeId> = HashMap::with_capacity(specs.len());

        for (i, spec) in specs.iter().enumerate() {
            if index.insert(spec.name.clone(), NodeId(i)).is_some() {
                return Err(GraphError::DuplicateTask(spec.name.clone()));
            }
        }

        let mut nodes = Vec::with_capacity(specs.len());
        let mut arity = 0;

        for (i, spec) in specs.into_iter().enumerate() {
            let mut deps = Vec::new();
            let mut inputs = Vec::with_capacity(spec.inputs.len());

            for binding in &spec.inputs {
                let source = resolve_binding(binding, &index, &mut deps, &mut arity).map_err(
                    |dependency| GraphError::UnknownDependency {
                        task: spec.name.clone(),
                        dependency,
                    },
                )?;
                inputs.push(source);
            }

            nodes.push(DagNode {
                id: NodeId(i),
                name: spec.name,
                task: spec.task,
                inputs,
                deps,
                dependents: Vec::new(),
            });
        }

        detect_cycle(&nodes)?;

        for i in 0..nodes.len() {
            let deps = nodes[i].deps.clone();
            for dep in deps {
                nodes[dep.0].dependents.push(NodeId(i));
            }
        }

        debug!(tasks = nodes.len(), arity, "dependency graph built");

        Ok(Self {
            nodes,
            index,
            arity,
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of flow arguments the task inputs refer to.
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// All nodes in declaration order.
    pub fn nodes(&self) -> impl Iterator<Item = &DagNode> {
        self.nodes.iter()
    }

    pub fn node(&self, id: NodeId) -> &DagNode {
        &self.nodes[id.0]
    }

    pub fn id_of(&self, name: &str) -> Option<NodeId> {
        self.index.get(name).copied()
    }

    pub fn get(&self, name: &str) -> Option<&DagNode> {
        self.id_of(name).map(|id| self.node(id))
    }

    pub fn dependencies_of(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].deps
    }

    pub fn dependents_of(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].dependents
    }

    /// Tasks with no predecessors.
    pub fn roots(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .filter(|n| n.deps.is_empty())
            .map(|n| n.id)
    }

    /// Tasks nothing depends on.
    pub fn sinks(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .filter(|n| n.dependents.is_empty())
            .map(|n| n.id)
    }

    /// Lazily compute topological layers.
    ///
    /// Every layer holds the tasks whose predecessors all appear in earlier
    /// layers. Within a layer, tasks are in declaration order.
    pub fn topological_layers(&self) -> Layers<'_> {
        Layers::new(self)
    }

    /// Layer index of every node, indexed by `NodeId`.
    pub fn layer_indices(&self) -> Vec<usize> {
        let mut out = vec![0; self.nodes.len()];
        for (depth, layer) in self.topological_layers().enumerate() {
            for id in layer {
                out[id.0] = depth;
            }
        }
        out
    }

    /// Resolve a flow output binding against this graph.
    ///
    /// Returns the resolved source and the number of flow arguments it
    /// refers to.
    pub(crate) fn resolve_output(&self, binding: &Binding) -> Result<(Source, usize), GraphError> {
        let mut deps = Vec::new();
        let mut arity = 0;
        let source = resolve_binding(binding, &self.index, &mut deps, &mut arity)
            .map_err(GraphError::UnknownOutput)?;
        Ok((source, arity))
    }
}

/// Iterator over topological layers (Kahn's algorithm, one layer per step).
#[derive(Debug)]
pub struct Layers<'a> {
    graph: &'a DependencyGraph,
    remaining: Vec<usize>,
    frontier: Vec<NodeId>,
}

impl<'a> Layers<'a> {
    fn new(graph: &'a DependencyGraph) -> Self {
        let remaining = graph.nodes.iter().map(|n| n.deps.len()).collect();
        let frontier = graph.roots().collect();
        Self {
            graph,
            remaining,
            frontier,
        }
    }
}

impl Iterator for Layers<'_> {
    type Item = Vec<NodeId>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.frontier.is_empty() {
            return None;
        }

        let layer = std::mem::take(&mut self.frontier);
        let mut next = Vec::new();

        for id in &layer {
            for &dependent in self.graph.dependents_of(*id) {
                let remaining = &mut self.remaining[dependent.0];
                *remaining -= 1;
                if *remaining == 0 {
                    next.push(dependent);
                }
            }
        }

        next.sort_unstable();
        self.frontier = next;

        Some(layer)
    }
}

/// Map a binding to a source, collecting task dependencies and the highest
/// argument index. Returns the unknown task name on failure.
fn resolve_binding(
    binding: &Binding,
    index: &HashMap<String, NodeId>,
    deps: &mut Vec<NodeId>,
    arity: &mut usize,
) -> Result<Source, String> {
    match binding {
        Binding::Task(name) => {
            let id = *index.get(name).ok_or_else(|| name.clone())?;
            if !deps.contains(&id) {
                deps.push(id);
            }
            Ok(Source::Task(id))
        }
        Binding::Argument(i) => {
            *arity = (*arity).max(i + 1);
            Ok(Source::Argument(*i))
        }
        Binding::Constant(value) => Ok(Source::Constant(value.clone())),
        Binding::List(items) => items
            .iter()
            .map(|item| resolve_binding(item, index, deps, arity))
            .collect::<Result<Vec<_>, _>>()
            .map(Source::List),
    }
}

fn detect_cycle(nodes: &[DagNode]) -> Result<(), CycleError> {
    // Edge direction: dep -> task.
    let mut graph: DiGraphMap<usize, ()> = DiGraphMap::new();

    for node in nodes {
        graph.add_node(node.id.0);
    }

    for node in nodes {
        for dep in &node.deps {
            graph.add_edge(dep.0, node.id.0, ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => {
            let offending = cycle.node_id();
            let mut members = tarjan_scc(&graph)
                .into_iter()
                .find(|scc| scc.contains(&offending))
                .unwrap_or_else(|| vec![offending]);
            members.sort_unstable();

            Err(CycleError {
                tasks: members
                    .into_iter()
                    .map(|i| nodes[i].name.clone())
                    .collect(),
            })
        }
    }
}

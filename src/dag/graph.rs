// src/dag/graph.rs

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone)]
struct DagNode {
    /// Direct dependencies: tasks that must complete before this one can run.
    deps: Vec<String>,
    /// Direct dependents: tasks that depend on this one.
    dependents: Vec<String>,
}

/// Declared-dependency graph of pipeline steps.
///
/// Used to reject cyclic configurations up front and to print a stable
/// execution order for `--dry-run`. Runtime gating does not consult it; the
/// execution gate works off the registry alone.
#[derive(Debug, Clone, Default)]
pub struct DagGraph {
    nodes: HashMap<String, DagNode>,
    /// Insertion order, used to break ties deterministically.
    order: Vec<String>,
}

impl DagGraph {
    /// Build a graph from `(id, dependencies)` pairs.
    ///
    /// Dependencies naming unknown ids are kept as edges but do not create
    /// nodes of their own.
    pub fn from_dependencies(entries: impl IntoIterator<Item = (String, Vec<String>)>) -> Self {
        let mut nodes: HashMap<String, DagNode> = HashMap::new();
        let mut order = Vec::new();

        // First pass: create nodes with their dependency lists.
        for (name, deps) in entries {
            if !nodes.contains_key(&name) {
                order.push(name.clone());
            }
            nodes.insert(
                name,
                DagNode {
                    deps,
                    dependents: Vec::new(),
                },
            );
        }

        // Second pass: populate dependents based on deps.
        for task_name in &order {
            let deps = nodes
                .get(task_name)
                .map(|n| n.deps.clone())
                .unwrap_or_default();

            for dep in deps {
                if let Some(dep_node) = nodes.get_mut(&dep) {
                    dep_node.dependents.push(task_name.clone());
                }
            }
        }

        Self { nodes, order }
    }

    /// All task names in insertion order.
    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    /// Immediate dependencies of a task.
    pub fn dependencies_of(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a task.
    pub fn dependents_of(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Topological order of the known tasks (dependencies first).
    ///
    /// On a cycle, returns the name of a task involved in it.
    pub fn topological_order(&self) -> Result<Vec<String>, String> {
        // Edge direction: dep -> task.
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

        for name in &self.order {
            graph.add_node(name.as_str());
        }

        for name in &self.order {
            for dep in self.dependencies_of(name) {
                if self.nodes.contains_key(dep) {
                    graph.add_edge(dep.as_str(), name.as_str(), ());
                }
            }
        }

        toposort(&graph, None)
            .map(|sorted| sorted.into_iter().map(str::to_string).collect())
            .map_err(|cycle| cycle.node_id().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(entries: &[(&str, &[&str])]) -> DagGraph {
        DagGraph::from_dependencies(entries.iter().map(|(name, deps)| {
            (
                name.to_string(),
                deps.iter().map(|d| d.to_string()).collect(),
            )
        }))
    }

    #[test]
    fn tracks_dependents() {
        let g = graph(&[("a", &[]), ("b", &["a"]), ("c", &["a"])]);
        assert_eq!(g.dependents_of("a"), ["b".to_string(), "c".to_string()]);
        assert_eq!(g.dependencies_of("b"), ["a".to_string()]);
    }

    #[test]
    fn orders_dependencies_first() {
        let g = graph(&[("b", &["a"]), ("a", &[])]);
        let order = g.topological_order().unwrap();
        let pos = |n: &str| order.iter().position(|x| x == n).unwrap();
        assert!(pos("a") < pos("b"));
    }

    #[test]
    fn reports_cycles() {
        let g = graph(&[("a", &["b"]), ("b", &["a"])]);
        let node = g.topological_order().unwrap_err();
        assert!(node == "a" || node == "b");
    }
}

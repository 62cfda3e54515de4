//! Hierarchy diagnostics using petgraph.
//!
//! Builds a directed graph of the parent -> child references reachable from
//! one issue and reports shapes a well-formed hierarchy never has: cycles,
//! issues listed as a child by more than one parent, and child references
//! that no longer resolve.

use super::{DanglingChild, expand};
use crate::domain::IssueKey;
use crate::error::Result;
use crate::issue::Tracker;
use petgraph::Direction;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// Parent -> child graph of everything reachable from one root.
#[derive(Debug)]
pub struct HierarchyGraph {
    root: IssueKey,
    graph: DiGraph<IssueKey, ()>,
    node_map: HashMap<IssueKey, NodeIndex>,
    dangling: Vec<DanglingChild>,
}

impl HierarchyGraph {
    /// Walk down from `root` and record every child reference seen.
    ///
    /// # Errors
    ///
    /// Same as [`walk`](super::walk).
    pub async fn build(tracker: &Tracker, root: &IssueKey) -> Result<Self> {
        let expansion = expand(tracker, root, None).await?;

        let mut graph = DiGraph::new();
        let mut node_map = HashMap::new();
        for step in &expansion.steps {
            let node = graph.add_node(step.key.clone());
            node_map.insert(step.key.clone(), node);
        }
        for (parent, child) in &expansion.edges {
            if let (Some(&from), Some(&to)) = (node_map.get(parent), node_map.get(child)) {
                graph.update_edge(from, to, ());
            }
        }

        let hierarchy = Self {
            root: root.clone(),
            graph,
            node_map,
            dangling: expansion.dangling,
        };
        tracing::debug!(
            key = %root,
            nodes = hierarchy.node_count(),
            edges = hierarchy.edge_count(),
            "Built hierarchy graph"
        );
        Ok(hierarchy)
    }

    /// The issue the graph was built from.
    pub fn root(&self) -> &IssueKey {
        &self.root
    }

    /// Number of issues reached, root included.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of distinct parent -> child references.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns `true` if `key` was reached.
    pub fn contains(&self, key: &IssueKey) -> bool {
        self.node_map.contains_key(key)
    }

    /// Direct children of `key` within the graph, sorted.
    pub fn children_of(&self, key: &IssueKey) -> Vec<IssueKey> {
        self.neighbors(key, Direction::Outgoing)
    }

    /// Parents of `key` within the graph, sorted.
    pub fn parents_of(&self, key: &IssueKey) -> Vec<IssueKey> {
        self.neighbors(key, Direction::Incoming)
    }

    fn neighbors(&self, key: &IssueKey, direction: Direction) -> Vec<IssueKey> {
        let Some(&node) = self.node_map.get(key) else {
            return Vec::new();
        };
        let mut keys: Vec<IssueKey> = self
            .graph
            .neighbors_directed(node, direction)
            .map(|n| self.graph[n].clone())
            .collect();
        keys.sort();
        keys
    }

    /// Groups of issues that are each other's descendants.
    ///
    /// Each entry is one strongly connected component with its keys
    /// sorted; an issue listed as its own child is a one-element entry.
    pub fn cycles(&self) -> Vec<Vec<IssueKey>> {
        let mut cycles: Vec<Vec<IssueKey>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || component
                        .first()
                        .is_some_and(|node| self.graph.find_edge(*node, *node).is_some())
            })
            .map(|component| {
                let mut keys: Vec<IssueKey> =
                    component.into_iter().map(|n| self.graph[n].clone()).collect();
                keys.sort();
                keys
            })
            .collect();
        cycles.sort();

        for cycle in &cycles {
            tracing::warn!(key = %self.root, members = ?cycle, "Hierarchy cycle detected");
        }
        cycles
    }

    /// Issues listed as a child by more than one parent, sorted.
    pub fn shared_children(&self) -> Vec<IssueKey> {
        let mut shared: Vec<IssueKey> = self
            .graph
            .node_indices()
            .filter(|&n| {
                self.graph
                    .neighbors_directed(n, Direction::Incoming)
                    .count()
                    > 1
            })
            .map(|n| self.graph[n].clone())
            .collect();
        shared.sort();
        shared
    }

    /// Child references that did not resolve, in walk order.
    pub fn dangling(&self) -> &[DanglingChild] {
        &self.dangling
    }

    /// Returns `true` if no cycles, shared children, or dangling references
    /// were found.
    pub fn is_well_formed(&self) -> bool {
        self.dangling.is_empty() && self.shared_children().is_empty() && self.cycles().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::IssueCache;
    use crate::tracker::{SnapshotClient, raw_issue};
    use serde_json::Value;
    use std::sync::Arc;

    fn tracker(records: Vec<Value>) -> Tracker {
        Tracker::new(
            Arc::new(SnapshotClient::from_records(records).unwrap()),
            IssueCache::new(),
        )
    }

    fn k(key: &str) -> IssueKey {
        IssueKey::new(key)
    }

    #[tokio::test]
    async fn test_tree_is_well_formed() {
        let tracker = tracker(vec![
            raw_issue("R").subtasks(&["A", "B"]).build(),
            raw_issue("A").build(),
            raw_issue("B").build(),
        ]);

        let graph = HierarchyGraph::build(&tracker, &k("R")).await.unwrap();

        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.children_of(&k("R")), vec![k("A"), k("B")]);
        assert!(graph.is_well_formed());
    }

    #[tokio::test]
    async fn test_two_node_cycle() {
        let tracker = tracker(vec![
            raw_issue("A").subtask("B").build(),
            raw_issue("B").subtask("A").build(),
        ]);

        let graph = HierarchyGraph::build(&tracker, &k("A")).await.unwrap();

        assert_eq!(graph.cycles(), vec![vec![k("A"), k("B")]]);
        assert!(!graph.is_well_formed());
    }

    #[tokio::test]
    async fn test_self_loop_is_a_cycle() {
        let tracker = tracker(vec![raw_issue("A").subtask("A").build()]);

        let graph = HierarchyGraph::build(&tracker, &k("A")).await.unwrap();

        assert_eq!(graph.cycles(), vec![vec![k("A")]]);
    }

    #[tokio::test]
    async fn test_shared_child() {
        let tracker = tracker(vec![
            raw_issue("R").subtasks(&["A", "B"]).build(),
            raw_issue("A").subtask("C").build(),
            raw_issue("B").subtask("C").build(),
            raw_issue("C").build(),
        ]);

        let graph = HierarchyGraph::build(&tracker, &k("R")).await.unwrap();

        assert_eq!(graph.shared_children(), vec![k("C")]);
        assert_eq!(graph.parents_of(&k("C")), vec![k("A"), k("B")]);
        assert!(graph.cycles().is_empty());
    }

    #[tokio::test]
    async fn test_dangling_child_recorded() {
        let tracker = tracker(vec![raw_issue("R").subtask("GONE-1").build()]);

        let graph = HierarchyGraph::build(&tracker, &k("R")).await.unwrap();

        assert_eq!(
            graph.dangling(),
            &[DanglingChild {
                parent: k("R"),
                child: k("GONE-1"),
            }]
        );
        assert!(!graph.contains(&k("GONE-1")));
    }
}

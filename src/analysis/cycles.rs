// Cycle detector - finds dependency cycles that pin themselves
//
// Reference counting cannot reclaim a cycle: once A -> B -> A is reachable,
// each member holds a count on the other. After every external root is
// released the members stay kept. These components are reported so that a
// full run can be scheduled when incremental output drifts.

use crate::graph::{GraphStore, NodeRef, ShrinkType};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;
use tracing::debug;

/// A strongly connected component of the member graph
#[derive(Debug, Clone)]
pub struct CycleInfo {
    /// Nodes in this cycle, sorted
    pub members: Vec<NodeRef>,
    /// Whether every member currently has a positive count
    pub is_pinned: bool,
    pub size: usize,
}

/// Detector for reference cycles in the reachability graph
pub struct CycleDetector;

impl CycleDetector {
    pub fn new() -> Self {
        Self
    }

    /// Find all cycles, including self-recursive methods, largest first
    pub fn find_cycles(&self, graph: &GraphStore, shrink_type: ShrinkType) -> Vec<CycleInfo> {
        let (inner, _) = Self::build_petgraph(graph);

        let mut cycles: Vec<CycleInfo> = tarjan_scc(&inner)
            .into_iter()
            .filter(|scc| scc.len() > 1 || inner.contains_edge(scc[0], scc[0]))
            .map(|scc| {
                let mut members: Vec<NodeRef> = scc.iter().map(|&idx| inner[idx].clone()).collect();
                members.sort();
                let is_pinned = members.iter().all(|m| graph.counter(m, shrink_type) > 0);
                CycleInfo {
                    size: members.len(),
                    members,
                    is_pinned,
                }
            })
            .collect();

        cycles.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.members.cmp(&b.members)));
        debug!("Found {} dependency cycles", cycles.len());
        cycles
    }

    /// Cycles whose members are all currently kept for `shrink_type`
    pub fn find_pinned_cycles(&self, graph: &GraphStore, shrink_type: ShrinkType) -> Vec<CycleInfo> {
        self.find_cycles(graph, shrink_type)
            .into_iter()
            .filter(|c| c.is_pinned)
            .collect()
    }

    fn build_petgraph(graph: &GraphStore) -> (DiGraph<NodeRef, ()>, HashMap<NodeRef, NodeIndex>) {
        let mut inner = DiGraph::new();
        let mut index = HashMap::new();

        for node in graph.node_refs() {
            let idx = inner.add_node(node.clone());
            index.insert(node, idx);
        }
        for (node, &from) in &index {
            for dependency in graph.dependencies(node) {
                if let Some(&to) = index.get(&dependency) {
                    inner.add_edge(from, to, ());
                }
            }
        }

        (inner, index)
    }
}

impl Default for CycleDetector {
    fn default() -> Self {
        Self::new()
    }
}

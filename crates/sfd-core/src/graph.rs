//! Topological diagnostics over the branch table.
//!
//! The Newton solver assumes a single electrical island containing the slack
//! bus; a disconnected case produces a structurally singular Jacobian and a
//! non-converging solve. These helpers let callers detect that situation
//! before (or after) it bites.

use crate::model::NetworkModel;
use petgraph::algo::connected_components;
use petgraph::graph::{NodeIndex, UnGraph};
use std::collections::{HashSet, VecDeque};

/// One electrical island: a maximal set of buses joined by branches.
#[derive(Debug, Clone)]
pub struct IslandSummary {
    pub island_id: usize,
    /// 1-based bus numbers, ascending
    pub buses: Vec<usize>,
}

fn topology_graph(model: &NetworkModel) -> UnGraph<usize, ()> {
    let mut graph = UnGraph::new_undirected();
    let nodes: Vec<NodeIndex> = model
        .buses()
        .iter()
        .map(|bus| graph.add_node(bus.number))
        .collect();
    for branch in model.branches() {
        graph.add_edge(nodes[branch.from - 1], nodes[branch.to - 1], ());
    }
    graph
}

/// Whether every bus is reachable from every other bus.
pub fn is_connected(model: &NetworkModel) -> bool {
    connected_components(&topology_graph(model)) <= 1
}

/// Label the electrical islands (breadth-first search over the branch list).
pub fn find_islands(model: &NetworkModel) -> Vec<IslandSummary> {
    let graph = topology_graph(model);
    let mut visited = HashSet::new();
    let mut islands = Vec::new();
    let mut island_id = 0;
    for start in graph.node_indices() {
        if visited.contains(&start) {
            continue;
        }
        let mut queue = VecDeque::new();
        queue.push_back(start);
        let mut members = Vec::new();
        while let Some(node) = queue.pop_front() {
            if !visited.insert(node) {
                continue;
            }
            members.push(graph[node]);
            for neighbor in graph.neighbors(node) {
                if !visited.contains(&neighbor) {
                    queue.push_back(neighbor);
                }
            }
        }
        members.sort_unstable();
        islands.push(IslandSummary {
            island_id,
            buses: members,
        });
        island_id += 1;
    }
    islands
}

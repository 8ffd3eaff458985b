//! Dependency graph module.
//!
//! Provides `DependencyGraph`, a petgraph view of a registry's declared
//! dependencies. The evaluator never uses it; it exists to check the
//! registry (acyclicity, evaluation order) and to answer reachability
//! questions in tests and tooling.

use crate::error::StatError;
use crate::registry::Registry;
use crate::stat_id::StatId;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Bfs;
use petgraph::Direction;
use std::collections::{HashMap, HashSet};

/// A directed graph of stat dependencies.
///
/// Edges point from a dependency to the stat that depends on it, so a
/// topological order lists dependencies first.
///
/// # Examples
///
/// ```rust
/// use vstat::graph::DependencyGraph;
/// use vstat::{RegistryBuilder, StatId};
///
/// let (str_id, atk_id) = (StatId::new(0), StatId::new(1));
/// let mut builder = RegistryBuilder::new(2);
/// builder.register(atk_id, &[str_id], move |s| s.stat(str_id) * 2);
/// let registry = builder.build();
///
/// let graph = DependencyGraph::from_registry(&registry);
/// let order = graph.topological_sort().unwrap();
/// assert_eq!(order, vec![str_id, atk_id]);
/// ```
pub struct DependencyGraph {
    graph: DiGraph<StatId, ()>,
    node_map: HashMap<StatId, NodeIndex>,
}

impl DependencyGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_map: HashMap::new(),
        }
    }

    /// Build the graph of every registered formula and its dependencies.
    ///
    /// Nodes are added in registration order so that results are
    /// deterministic.
    pub fn from_registry(registry: &Registry) -> Self {
        let mut graph = Self::new();
        for node in registry.nodes() {
            graph.add_node(node.id());
            for &dep in node.dependencies() {
                graph.add_edge(node.id(), dep);
            }
        }
        graph
    }

    /// Add a node if it doesn't exist and return its index.
    pub fn add_node(&mut self, stat_id: StatId) -> NodeIndex {
        if let Some(&idx) = self.node_map.get(&stat_id) {
            idx
        } else {
            let idx = self.graph.add_node(stat_id);
            self.node_map.insert(stat_id, idx);
            idx
        }
    }

    /// Record that `from` depends on `to`.
    pub fn add_edge(&mut self, from: StatId, to: StatId) {
        let from_idx = self.add_node(from);
        let to_idx = self.add_node(to);
        self.graph.add_edge(to_idx, from_idx, ());
    }

    /// Detect cycles with a depth-first search.
    ///
    /// Returns `Err(StatError::Cycle)` with a closed path (first and last
    /// entries equal) listing only the stats on the cycle.
    pub fn detect_cycles(&self) -> Result<(), StatError> {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();

        for node_idx in self.graph.node_indices() {
            if !visited.contains(&node_idx) {
                let mut cycle_path = Vec::new();
                if let Some(cycle) =
                    self.dfs_cycle_detect(node_idx, &mut visited, &mut rec_stack, &mut cycle_path)
                {
                    return Err(cycle);
                }
            }
        }

        Ok(())
    }

    fn dfs_cycle_detect(
        &self,
        node: NodeIndex,
        visited: &mut HashSet<NodeIndex>,
        rec_stack: &mut HashSet<NodeIndex>,
        cycle_path: &mut Vec<StatId>,
    ) -> Option<StatError> {
        visited.insert(node);
        rec_stack.insert(node);
        cycle_path.push(self.graph[node]);

        for neighbor in self.graph.neighbors_directed(node, Direction::Outgoing) {
            if !visited.contains(&neighbor) {
                if let Some(cycle) =
                    self.dfs_cycle_detect(neighbor, visited, rec_stack, cycle_path)
                {
                    return Some(cycle);
                }
            } else if rec_stack.contains(&neighbor) {
                let neighbor_stat = self.graph[neighbor];
                let start = cycle_path
                    .iter()
                    .position(|stat| *stat == neighbor_stat)
                    .unwrap_or(0);
                let mut path = cycle_path[start..].to_vec();
                path.push(neighbor_stat);
                return Some(StatError::Cycle { path });
            }
        }

        rec_stack.remove(&node);
        cycle_path.pop();
        None
    }

    /// Order every stat so that dependencies come before dependants.
    pub fn topological_sort(&self) -> Result<Vec<StatId>, StatError> {
        self.detect_cycles()?;

        match toposort(&self.graph, None) {
            Ok(indices) => Ok(indices.into_iter().map(|idx| self.graph[idx]).collect()),
            Err(cycle) => Err(StatError::Cycle {
                path: vec![self.graph[cycle.node_id()]],
            }),
        }
    }

    /// Every stat whose value depends, directly or transitively, on `stat_id`.
    ///
    /// The start stat itself is not included.
    pub fn reachable_from(&self, stat_id: StatId) -> HashSet<StatId> {
        let mut reached = HashSet::new();
        if let Some(&start) = self.node_map.get(&stat_id) {
            let mut bfs = Bfs::new(&self.graph, start);
            while let Some(idx) = bfs.next(&self.graph) {
                if idx != start {
                    reached.insert(self.graph[idx]);
                }
            }
        }
        reached
    }

    /// All stats in the graph.
    pub fn nodes(&self) -> Vec<StatId> {
        self.graph
            .node_indices()
            .map(|idx| self.graph[idx])
            .collect()
    }

    /// Whether the stat appears in the graph.
    pub fn contains_node(&self, stat_id: StatId) -> bool {
        self.node_map.contains_key(&stat_id)
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}

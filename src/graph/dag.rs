// ABOUTME: Directed acyclic graph over arbitrary payloads with a synthetic root node
// ABOUTME: Handles node/edge insertion, BFS/DFS traversal, cycle detection and wavefront batching

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Write as _;
use std::ops::ControlFlow;

use super::error::{GraphError, Result};

/// ID of the synthetic root node every graph starts with.
pub const ROOT_ID: i64 = 0;

#[derive(Debug, Clone)]
pub struct Node<T> {
    pub id: i64,
    pub value: T,
}

/// A DAG whose nodes are addressed by caller-chosen integer IDs.
///
/// Node `0` always exists and holds `T::default()`. Edges point from a
/// dependency to its dependent, so the children of a node are the nodes that
/// may run once it has finished.
#[derive(Debug, Clone)]
pub struct Graph<T> {
    graph: DiGraph<Node<T>, ()>,
    indices: HashMap<i64, NodeIndex>,
}

impl<T: Default> Default for Graph<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Default> Graph<T> {
    pub fn new() -> Self {
        let mut graph = DiGraph::new();
        let root = graph.add_node(Node {
            id: ROOT_ID,
            value: T::default(),
        });

        let mut indices = HashMap::new();
        indices.insert(ROOT_ID, root);

        Self { graph, indices }
    }
}

impl<T> Graph<T> {
    pub fn add_node(&mut self, id: i64, value: T) -> Result<()> {
        if self.indices.contains_key(&id) {
            return Err(GraphError::DuplicateId { id });
        }

        let index = self.graph.add_node(Node { id, value });
        self.indices.insert(id, index);
        Ok(())
    }

    /// Add an edge `from -> to`. Adding the same edge twice keeps a single edge.
    pub fn add_edge(&mut self, from: i64, to: i64) -> Result<()> {
        let from_index = self.index(from)?;
        let to_index = self.index(to)?;
        self.graph.update_edge(from_index, to_index, ());
        Ok(())
    }

    pub fn clear_edges(&mut self) {
        self.graph.clear_edges();
    }

    pub fn contains(&self, id: i64) -> bool {
        self.indices.contains_key(&id)
    }

    pub fn node(&self, id: i64) -> Result<&T> {
        let index = self.index(id)?;
        Ok(&self.graph[index].value)
    }

    pub fn node_mut(&mut self, id: i64) -> Result<&mut T> {
        let index = self.index(id)?;
        Ok(&mut self.graph[index].value)
    }

    /// Nodes in insertion order, excluding the root.
    pub fn nodes(&self) -> impl Iterator<Item = &Node<T>> {
        self.graph
            .node_weights()
            .filter(|node| node.id != ROOT_ID)
    }

    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node<T>> {
        self.graph
            .node_weights_mut()
            .filter(|node| node.id != ROOT_ID)
    }

    /// Number of nodes, excluding the root.
    pub fn len(&self) -> usize {
        self.graph.node_count() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Nodes reachable from `id` by one outgoing edge, in edge insertion order.
    pub fn adj(&self, id: i64) -> Result<Vec<&Node<T>>> {
        let index = self.index(id)?;
        Ok(self
            .children(index)
            .into_iter()
            .map(|child| &self.graph[child])
            .collect())
    }

    /// Nodes with an edge pointing at `id`, in edge insertion order.
    pub fn parents(&self, id: i64) -> Result<Vec<&Node<T>>> {
        let index = self.index(id)?;
        let mut parents: Vec<_> = self
            .graph
            .neighbors_directed(index, Direction::Incoming)
            .map(|parent| &self.graph[parent])
            .collect();
        parents.reverse();
        Ok(parents)
    }

    pub fn has_edge(&self, from: i64, to: i64) -> bool {
        match (self.indices.get(&from), self.indices.get(&to)) {
            (Some(&from), Some(&to)) => self.graph.contains_edge(from, to),
            _ => false,
        }
    }

    /// All edges as `(from, to)` ID pairs.
    pub fn edges(&self) -> Vec<(i64, i64)> {
        self.graph
            .edge_indices()
            .filter_map(|edge| self.graph.edge_endpoints(edge))
            .map(|(from, to)| (self.graph[from].id, self.graph[to].id))
            .collect()
    }

    /// Queue-based breadth-first traversal starting at (and including) `start`.
    ///
    /// Returning `ControlFlow::Break` from `visit` stops the walk without an
    /// error; returning `Err` aborts it and propagates the error.
    pub fn breadth_first_search<E, F>(&self, start: i64, mut visit: F) -> std::result::Result<(), E>
    where
        E: From<GraphError>,
        F: FnMut(&Node<T>) -> std::result::Result<ControlFlow<()>, E>,
    {
        let start_index = self.index(start)?;
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        visited.insert(start_index);
        queue.push_back(start_index);

        while let Some(current) = queue.pop_front() {
            if visit(&self.graph[current])?.is_break() {
                return Ok(());
            }

            for child in self.children(current) {
                if visited.insert(child) {
                    queue.push_back(child);
                }
            }
        }

        Ok(())
    }

    /// Recursive depth-first traversal. `visit` also receives the depth of the
    /// node relative to `start`.
    pub fn depth_first_search<E, F>(&self, start: i64, mut visit: F) -> std::result::Result<(), E>
    where
        E: From<GraphError>,
        F: FnMut(&Node<T>, usize) -> std::result::Result<ControlFlow<()>, E>,
    {
        let start_index = self.index(start)?;
        let mut visited = HashSet::new();
        self.dfs(start_index, 0, &mut visited, &mut visit)?;
        Ok(())
    }

    fn dfs<E, F>(
        &self,
        index: NodeIndex,
        depth: usize,
        visited: &mut HashSet<NodeIndex>,
        visit: &mut F,
    ) -> std::result::Result<ControlFlow<()>, E>
    where
        F: FnMut(&Node<T>, usize) -> std::result::Result<ControlFlow<()>, E>,
    {
        if !visited.insert(index) {
            return Ok(ControlFlow::Continue(()));
        }

        if visit(&self.graph[index], depth)?.is_break() {
            return Ok(ControlFlow::Break(()));
        }

        for child in self.children(index) {
            if self.dfs(child, depth + 1, visited, visit)?.is_break() {
                return Ok(ControlFlow::Break(()));
            }
        }

        Ok(ControlFlow::Continue(()))
    }

    /// Fails with [`GraphError::Cycle`] if the graph contains a cycle.
    pub fn validate_acyclic(&self) -> Result<()> {
        self.topological_order().map(|_| ())
    }

    /// Group every non-root node into execution batches.
    ///
    /// A node's batch is the length of the longest path from the root to it,
    /// so every dependency of a node lands in a strictly earlier batch and
    /// nodes in the same batch never depend on each other. Nodes without any
    /// parent are treated as children of the root. Within a batch, nodes keep
    /// insertion order.
    pub fn batches(&self) -> Result<Vec<Vec<i64>>> {
        let order = self.topological_order()?;
        let mut depth: HashMap<NodeIndex, usize> = HashMap::with_capacity(order.len());

        for index in order {
            let level = if self.graph[index].id == ROOT_ID {
                0
            } else {
                self.graph
                    .neighbors_directed(index, Direction::Incoming)
                    .filter_map(|parent| depth.get(&parent))
                    .map(|level| level + 1)
                    .max()
                    .unwrap_or(1)
            };
            depth.insert(index, level);
        }

        let mut batches: Vec<Vec<i64>> = Vec::new();
        for index in self.graph.node_indices() {
            let level = depth.get(&index).copied().unwrap_or(0);
            if level == 0 {
                continue;
            }
            if batches.len() < level {
                batches.resize_with(level, Vec::new);
            }
            batches[level - 1].push(self.graph[index].id);
        }

        Ok(batches)
    }

    /// Render the graph as an indented tree starting at the root.
    pub fn render<F>(&self, label: F) -> String
    where
        F: Fn(&Node<T>) -> String,
    {
        let mut out = String::new();
        let _ = self.depth_first_search::<GraphError, _>(ROOT_ID, |node, depth| {
            let _ = writeln!(out, "{}{}", "  ".repeat(depth), label(node));
            Ok(ControlFlow::Continue(()))
        });
        out
    }

    fn topological_order(&self) -> Result<Vec<NodeIndex>> {
        toposort(&self.graph, None).map_err(|cycle| GraphError::Cycle {
            id: self.graph[cycle.node_id()].id,
        })
    }

    fn index(&self, id: i64) -> Result<NodeIndex> {
        self.indices
            .get(&id)
            .copied()
            .ok_or(GraphError::NotFound { id })
    }

    fn children(&self, index: NodeIndex) -> Vec<NodeIndex> {
        // petgraph yields neighbors newest-first.
        let mut children: Vec<_> = self
            .graph
            .neighbors_directed(index, Direction::Outgoing)
            .collect();
        children.reverse();
        children
    }
}

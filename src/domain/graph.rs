//! Dependency graph for a message batch
//!
//! Nodes are message indices. A message depends on another when it
//! references the temporary ID the other provides. Provides cycle detection
//! and a stable topological order. Uses petgraph for storage.

use std::collections::{BTreeMap, VecDeque};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::Serialize;
use tracing::warn;

use super::id::TemporaryId;
use super::message::Message;

/// A second message declaring an already-provided ID
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateProvider {
    /// The contested ID
    pub id: TemporaryId,
    /// Index of the registered (first) provider
    pub first: usize,
    /// Index of the ignored provider
    pub ignored: usize,
}

/// The order in which a batch will be dispatched
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchPlan {
    /// Message indices in dispatch order
    pub order: Vec<usize>,
    /// The cycle that forced input-order fallback, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle: Option<Vec<usize>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// A dependency graph over message indices
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Edge direction: provider -> dependent ("provider dispatches first")
    graph: DiGraph<usize, ()>,

    /// Map from provided ID to the index of its (first) provider
    providers: BTreeMap<TemporaryId, usize>,

    /// Providers ignored because an earlier message claimed the same ID
    duplicates: Vec<DuplicateProvider>,
}

impl DependencyGraph {
    /// Builds the graph for a message batch
    pub fn from_messages(messages: &[Message]) -> Self {
        let mut graph = DiGraph::with_capacity(messages.len(), 0);
        for index in 0..messages.len() {
            graph.add_node(index);
        }

        // First pass: register providers (first by input order wins)
        let mut providers: BTreeMap<TemporaryId, usize> = BTreeMap::new();
        let mut duplicates = Vec::new();
        for (index, message) in messages.iter().enumerate() {
            let Ok(Some(id)) = message.provided_id() else {
                continue;
            };

            match providers.get(&id) {
                Some(&first) => {
                    warn!(
                        temporary_id = %id,
                        first,
                        ignored = index,
                        "duplicate temporary id provider ignored"
                    );
                    duplicates.push(DuplicateProvider {
                        id,
                        first,
                        ignored: index,
                    });
                }
                None => {
                    providers.insert(id, index);
                }
            }
        }

        // Second pass: add edges for references with a provider in this batch
        for (index, message) in messages.iter().enumerate() {
            for id in message.references() {
                if let Some(&provider) = providers.get(&id) {
                    if provider != index {
                        graph.update_edge(NodeIndex::new(provider), NodeIndex::new(index), ());
                    }
                }
            }
        }

        Self {
            graph,
            providers,
            duplicates,
        }
    }

    /// Returns the number of messages in the graph
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns true if the graph is empty
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Returns the number of dependency edges
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns the provider map
    pub fn providers(&self) -> &BTreeMap<TemporaryId, usize> {
        &self.providers
    }

    /// Returns the registered provider of an ID
    pub fn provider_of(&self, id: &TemporaryId) -> Option<usize> {
        self.providers.get(id).copied()
    }

    /// Returns the ignored duplicate providers
    pub fn duplicates(&self) -> &[DuplicateProvider] {
        &self.duplicates
    }

    /// Returns the messages `index` depends on, ascending
    pub fn dependencies(&self, index: usize) -> Vec<usize> {
        self.neighbors(index, Direction::Incoming)
    }

    /// Returns the messages that depend on `index`, ascending
    pub fn dependents(&self, index: usize) -> Vec<usize> {
        self.neighbors(index, Direction::Outgoing)
    }

    fn neighbors(&self, index: usize, direction: Direction) -> Vec<usize> {
        if index >= self.len() {
            return vec![];
        }

        let mut out: Vec<usize> = self
            .graph
            .neighbors_directed(NodeIndex::new(index), direction)
            .map(NodeIndex::index)
            .collect();
        out.sort_unstable();
        out
    }

    /// Finds a dependency cycle, if one exists
    ///
    /// Iterative white/gray/black depth-first search with an explicit stack
    /// of `(node, returning)` frames, so batch size cannot exhaust the call
    /// stack. The returned path lists indices where each depends on the next
    /// and the last depends on the first.
    pub fn find_cycle(&self) -> Option<Vec<usize>> {
        let n = self.len();
        let mut color = vec![Color::White; n];
        let mut parent: Vec<Option<usize>> = vec![None; n];

        for start in 0..n {
            if color[start] != Color::White {
                continue;
            }

            let mut stack = vec![(start, false)];
            while let Some((node, returning)) = stack.pop() {
                if returning {
                    color[node] = Color::Black;
                    continue;
                }
                // A node may be pushed by several parents; only enter it once
                if color[node] != Color::White {
                    continue;
                }

                color[node] = Color::Gray;
                stack.push((node, true));

                // Reverse so the lowest dependency is explored first
                for dep in self.dependencies(node).into_iter().rev() {
                    match color[dep] {
                        Color::White => {
                            parent[dep] = Some(node);
                            stack.push((dep, false));
                        }
                        Color::Gray => return Some(Self::cycle_path(node, dep, &parent)),
                        Color::Black => {}
                    }
                }
            }
        }

        None
    }

    /// Walks parent pointers from `node` back up to the gray ancestor `head`
    fn cycle_path(node: usize, head: usize, parent: &[Option<usize>]) -> Vec<usize> {
        let mut path = vec![node];
        let mut current = node;
        while current != head {
            match parent[current] {
                Some(p) => {
                    path.push(p);
                    current = p;
                }
                None => break,
            }
        }
        path.reverse();
        path
    }

    /// Returns all messages in dependency order (Kahn's algorithm)
    ///
    /// Zero in-degree messages are seeded in input order, so independent
    /// messages keep their relative order. Messages left unreached (only
    /// possible with a cycle) are appended in input order.
    pub fn topological_order(&self) -> Vec<usize> {
        let n = self.len();
        let mut in_degree: Vec<usize> = (0..n)
            .map(|i| {
                self.graph
                    .neighbors_directed(NodeIndex::new(i), Direction::Incoming)
                    .count()
            })
            .collect();

        let mut queue: VecDeque<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        let mut placed = vec![false; n];

        while let Some(node) = queue.pop_front() {
            order.push(node);
            placed[node] = true;

            for dependent in self.dependents(node) {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    queue.push_back(dependent);
                }
            }
        }

        if order.len() < n {
            let unreached: Vec<usize> = (0..n).filter(|&i| !placed[i]).collect();
            warn!(
                unreached = ?unreached,
                "topological sort left messages unreached, appending in input order"
            );
            order.extend(unreached);
        }

        order
    }

    /// Computes the dispatch plan
    ///
    /// On a cycle the whole batch falls back to input order.
    pub fn plan(&self) -> DispatchPlan {
        match self.find_cycle() {
            Some(cycle) => {
                warn!(
                    cycle = ?cycle,
                    "dependency cycle detected, dispatching in input order"
                );
                DispatchPlan {
                    order: (0..self.len()).collect(),
                    cycle: Some(cycle),
                }
            }
            None => DispatchPlan {
                order: self.topological_order(),
                cycle: None,
            },
        }
    }
}

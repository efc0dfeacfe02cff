//! Generation Traversal
//!
//! Orders a graph bottom-up in batches ("generations") so that everything in
//! a batch can be loaded concurrently.
//!
//! # Algorithm
//!
//! This is Kahn's algorithm driven by outdegree rather than indegree, because
//! edges point from a dependent to its dependency:
//!
//! 1. Nodes with outdegree 0 depend on nothing and form the first generation.
//!    Every other node gets a counter set to its outdegree.
//! 2. When a generation is produced, each node in it decrements the counter
//!    of every node pointing at it. A node whose counter reaches 0 joins the
//!    next generation and leaves the counter map.
//! 3. When a generation comes out empty while counters remain, those nodes
//!    sit on or behind a cycle and can never be scheduled.
//!
//! A node lands in the earliest generation its dependencies allow, so
//! generations are as large as possible.

use std::collections::HashMap;
use std::iter::FusedIterator;

use super::directed::{DirectedGraph, Key};
use super::node::NodeId;
use crate::error::{Error, Result};

/// Iterator over a graph's generations, dependencies first.
///
/// Yields `Ok(keys)` per generation. If part of the graph cannot be ordered
/// the iterator yields a single [`Error::CyclicGraph`] after the last
/// orderable generation and then ends. An empty graph yields nothing.
pub struct Generations<'g, K> {
    graph: &'g DirectedGraph<K>,

    /// Unsatisfied dependency count per node not yet scheduled.
    remaining: HashMap<NodeId, usize>,

    /// The generation to yield next.
    current: Vec<NodeId>,

    done: bool,
}

impl<'g, K: Key> Generations<'g, K> {
    pub(crate) fn new(graph: &'g DirectedGraph<K>) -> Self {
        let mut remaining = HashMap::new();
        let mut current = Vec::new();

        for (id, node) in graph.arena().iter() {
            match node.outdegree() {
                0 => current.push(id),
                outdegree => {
                    remaining.insert(id, outdegree);
                }
            }
        }

        Self {
            graph,
            remaining,
            current,
            done: false,
        }
    }

    /// Compute the generation after `generation`.
    fn advance(&mut self, generation: &[NodeId]) -> Vec<NodeId> {
        let arena = self.graph.arena();
        let mut next = Vec::new();

        for &sink in generation {
            for &source in arena[sink].incoming_edges() {
                let Some(count) = self.remaining.get_mut(&source) else {
                    continue;
                };
                *count -= 1;
                if *count == 0 {
                    self.remaining.remove(&source);
                    next.push(source);
                }
            }
        }

        next
    }

    fn keys(&self, generation: &[NodeId]) -> Vec<K> {
        generation
            .iter()
            .filter_map(|&id| self.graph.key(id).cloned())
            .collect()
    }
}

impl<K: Key> Iterator for Generations<'_, K> {
    type Item = Result<Vec<K>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if self.current.is_empty() {
            self.done = true;
            if self.remaining.is_empty() {
                return None;
            }
            return Some(Err(Error::CyclicGraph {
                remaining: self.remaining.len(),
            }));
        }

        let generation = std::mem::take(&mut self.current);
        self.current = self.advance(&generation);
        Some(Ok(self.keys(&generation)))
    }
}

impl<K: Key> FusedIterator for Generations<'_, K> {}

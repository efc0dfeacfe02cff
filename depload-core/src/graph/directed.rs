//! Directed Graph
//!
//! [`DirectedGraph`] maps caller keys onto nodes in a [`NodeArena`] and keeps
//! the inverse mapping so traversal, which works on node ids, can hand keys
//! back to the caller.
//!
//! An edge `source -> sink` means *source depends on sink*: the sink must be
//! loaded before the source.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::hash::Hash;

use indexmap::{Equivalent, IndexMap};
use smallvec::{smallvec, SmallVec};
use tracing::{debug, trace, warn};

use super::node::{Node, NodeArena, NodeId};
use super::options::GraphOptions;
use super::traversal::Generations;
use crate::error::{Error, Result};

/// Bounds every graph key satisfies.
///
/// Keys are compared by value and shown in error messages.
pub trait Key: Clone + Eq + Hash + fmt::Debug + fmt::Display {}

impl<T> Key for T where T: Clone + Eq + Hash + fmt::Debug + fmt::Display {}

/// A keyed directed graph with optional cycle rejection.
pub struct DirectedGraph<K> {
    options: GraphOptions,

    arena: NodeArena,

    /// Key to node.
    nodes: IndexMap<K, NodeId>,

    /// Node to key, indexed by [`NodeId::index`].
    node_keys: Vec<K>,
}

impl<K: Key> DirectedGraph<K> {
    /// Create an empty acyclic graph.
    pub fn new() -> Self {
        Self::with_options(GraphOptions::default())
    }

    /// Create an empty graph with the given options.
    pub fn with_options(options: GraphOptions) -> Self {
        Self {
            options,
            arena: NodeArena::new(),
            nodes: IndexMap::new(),
            node_keys: Vec::new(),
        }
    }

    pub fn options(&self) -> GraphOptions {
        self.options
    }

    /// Whether edge insertion rejects cycles.
    pub fn acyclic(&self) -> bool {
        self.options.acyclic
    }

    /// Check whether a node with this key exists.
    pub fn has<Q>(&self, key: &Q) -> bool
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        self.nodes.contains_key(key)
    }

    /// Get the id of the node with this key.
    pub fn node_id<Q>(&self, key: &Q) -> Result<NodeId>
    where
        Q: ?Sized + Hash + Equivalent<K> + fmt::Display,
    {
        self.nodes
            .get(key)
            .copied()
            .ok_or_else(|| Error::NodeUndefined {
                key: key.to_string(),
            })
    }

    /// Get the node with this key.
    pub fn node<Q>(&self, key: &Q) -> Result<&Node>
    where
        Q: ?Sized + Hash + Equivalent<K> + fmt::Display,
    {
        let id = self.node_id(key)?;
        Ok(&self.arena[id])
    }

    /// Get the key currently bound to a node.
    pub fn key(&self, id: NodeId) -> Option<&K> {
        self.node_keys.get(id.index())
    }

    /// Add an edgeless node.
    ///
    /// Fails with [`Error::NodeExists`] if the key is taken.
    pub fn add(&mut self, key: K) -> Result<NodeId> {
        if self.has(&key) {
            return Err(Error::NodeExists {
                key: key.to_string(),
            });
        }

        let id = self.arena.insert();
        trace!(key = %key, node = id.index(), "added node");
        self.nodes.insert(key.clone(), id);
        self.node_keys.push(key);
        Ok(id)
    }

    /// Check for an edge from `source` to `sink`.
    ///
    /// Missing keys are not an error; the answer is simply `false`.
    pub fn has_edge<Q, R>(&self, source: &Q, sink: &R) -> bool
    where
        Q: ?Sized + Hash + Equivalent<K>,
        R: ?Sized + Hash + Equivalent<K>,
    {
        match (self.nodes.get(source), self.nodes.get(sink)) {
            (Some(&source), Some(&sink)) => self.arena[source].has_edge(sink),
            _ => false,
        }
    }

    /// Add an edge meaning `source` depends on `sink`.
    ///
    /// In acyclic mode the edge is inserted, then the graph is searched for a
    /// cycle through `source`. If one is found the edge is removed again and
    /// [`Error::GraphCycle`] is returned, leaving the graph exactly as it was.
    pub fn add_edge<Q, R>(&mut self, source: &Q, sink: &R) -> Result<()>
    where
        Q: ?Sized + Hash + Equivalent<K> + fmt::Display,
        R: ?Sized + Hash + Equivalent<K> + fmt::Display,
    {
        let (source_id, sink_id) = self.endpoints(source, sink)?;

        self.arena.add_edge(source_id, sink_id)?;

        if self.acyclic() && self.has_cycle(source_id) {
            self.arena.remove_edge(source_id, sink_id)?;
            warn!(source = %source, sink = %sink, "rejected edge that closes a cycle");
            return Err(Error::GraphCycle {
                from: source.to_string(),
                to: sink.to_string(),
            });
        }

        trace!(source = %source, sink = %sink, "added edge");
        Ok(())
    }

    /// Remove the edge from `source` to `sink`.
    pub fn remove_edge<Q, R>(&mut self, source: &Q, sink: &R) -> Result<()>
    where
        Q: ?Sized + Hash + Equivalent<K> + fmt::Display,
        R: ?Sized + Hash + Equivalent<K> + fmt::Display,
    {
        let (source_id, sink_id) = self.endpoints(source, sink)?;
        self.arena.remove_edge(source_id, sink_id)
    }

    /// Rebind a node to a new key, keeping its edges.
    ///
    /// Fails with [`Error::NodeUndefined`] if `old_key` is absent and with
    /// [`Error::NodeExists`] if `new_key` already names a different node.
    pub fn rename<Q>(&mut self, old_key: &Q, new_key: K) -> Result<()>
    where
        Q: ?Sized + Hash + Equivalent<K> + fmt::Display,
    {
        let id = self.node_id(old_key)?;

        match self.nodes.get(&new_key) {
            Some(&existing) if existing == id => return Ok(()),
            Some(_) => {
                return Err(Error::NodeExists {
                    key: new_key.to_string(),
                })
            }
            None => {}
        }

        debug!(from = %old_key, to = %new_key, "renaming node");
        self.nodes.shift_remove(old_key);
        self.nodes.insert(new_key.clone(), id);
        self.node_keys[id.index()] = new_key;
        Ok(())
    }

    /// Check whether a cycle is reachable from `start`.
    ///
    /// Depth-first over outgoing edges. Nodes on the current path are kept
    /// apart from nodes already fully explored: meeting a node on the path is
    /// a cycle, meeting an explored one through a sibling branch is not.
    pub fn has_cycle(&self, start: NodeId) -> bool {
        let mut stack: SmallVec<[(NodeId, usize); 16]> = smallvec![(start, 0)];
        let mut path = HashSet::from([start]);
        let mut explored = HashSet::new();

        while let Some((id, next_edge)) = stack.last_mut() {
            let id = *id;
            match self.arena[id].edges().get_index(*next_edge) {
                Some(&next) => {
                    *next_edge += 1;
                    if path.contains(&next) {
                        return true;
                    }
                    if explored.contains(&next) {
                        continue;
                    }
                    path.insert(next);
                    stack.push((next, 0));
                }
                None => {
                    stack.pop();
                    path.remove(&id);
                    explored.insert(id);
                }
            }
        }

        false
    }

    /// Iterate over the graph's generations, dependencies first.
    ///
    /// See [`Generations`] for the ordering guarantees.
    pub fn generations(&self) -> Generations<'_, K> {
        Generations::new(self)
    }

    /// Visit the graph bottom-up, one generation at a time.
    ///
    /// `visit` receives each generation's keys and is awaited before the next
    /// generation is produced. The keys of one generation do not depend on
    /// each other and may be processed concurrently. The first error, from
    /// `visit` or from a cycle, stops the traversal.
    pub async fn traverse<F, Fut>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(Vec<K>) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        for (index, generation) in self.generations().enumerate() {
            let generation = generation?;
            debug!(generation = index, size = generation.len(), "visiting generation");
            visit(generation).await?;
        }
        Ok(())
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.arena.iter().map(|(_, node)| node.outdegree()).sum()
    }

    /// Iterate over keys in node creation order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.node_keys.iter()
    }

    pub(crate) fn arena(&self) -> &NodeArena {
        &self.arena
    }

    fn endpoints<Q, R>(&self, source: &Q, sink: &R) -> Result<(NodeId, NodeId)>
    where
        Q: ?Sized + Hash + Equivalent<K> + fmt::Display,
        R: ?Sized + Hash + Equivalent<K> + fmt::Display,
    {
        let source_id = self
            .nodes
            .get(source)
            .copied()
            .ok_or_else(|| Error::SourceNodeUndefined {
                key: source.to_string(),
            })?;
        let sink_id = self
            .nodes
            .get(sink)
            .copied()
            .ok_or_else(|| Error::SinkNodeUndefined {
                key: sink.to_string(),
            })?;
        Ok((source_id, sink_id))
    }
}

impl<K: Key> Default for DirectedGraph<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> fmt::Debug for DirectedGraph<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectedGraph")
            .field("acyclic", &self.options.acyclic)
            .field("node_count", &self.arena.len())
            .finish()
    }
}

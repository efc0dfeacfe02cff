//! Graph Nodes
//!
//! A node carries no payload; it is pure topology. Each node records the
//! nodes it points to (its outgoing edges, "depends on") and the nodes that
//! point to it (its incoming edges, "depended on by").
//!
//! Nodes never own each other. They live in a [`NodeArena`] and refer to one
//! another by [`NodeId`], and every edge mutation goes through the arena so
//! both halves of an edge are written together.

use indexmap::IndexSet;

use crate::error::{Error, Result};

/// Index of a node inside its [`NodeArena`].
///
/// Ids are handed out by the arena in insertion order and stay valid for the
/// arena's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    /// Get the raw index value.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// A vertex in the dependency graph.
#[derive(Debug, Default, Clone)]
pub struct Node {
    /// Nodes this node depends on.
    outgoing: IndexSet<NodeId>,

    /// Nodes that depend on this node.
    incoming: IndexSet<NodeId>,
}

impl Node {
    /// Check for an outgoing edge to `sink`.
    pub fn has_outgoing_edge(&self, sink: NodeId) -> bool {
        self.outgoing.contains(&sink)
    }

    /// Alias of [`Node::has_outgoing_edge`].
    pub fn has_edge(&self, sink: NodeId) -> bool {
        self.has_outgoing_edge(sink)
    }

    /// Check for an incoming edge from `source`.
    pub fn has_incoming_edge(&self, source: NodeId) -> bool {
        self.incoming.contains(&source)
    }

    /// Targets of this node's outgoing edges.
    pub fn edges(&self) -> &IndexSet<NodeId> {
        &self.outgoing
    }

    /// Sources of this node's incoming edges.
    pub fn incoming_edges(&self) -> &IndexSet<NodeId> {
        &self.incoming
    }

    /// Number of nodes depending on this one.
    pub fn indegree(&self) -> usize {
        self.incoming.len()
    }

    /// Number of nodes this one depends on.
    pub fn outdegree(&self) -> usize {
        self.outgoing.len()
    }
}

/// Owner of every node in a graph.
///
/// The arena is the only place edges are written, which keeps the two edge
/// sets symmetric: `a` lists `b` as outgoing exactly when `b` lists `a` as
/// incoming.
///
/// Methods taking a [`NodeId`] panic if the id did not come from this arena.
#[derive(Debug, Default, Clone)]
pub struct NodeArena {
    nodes: Vec<Node>,
}

impl NodeArena {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new node with no edges.
    pub fn insert(&mut self) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::default());
        id
    }

    /// Get a node by id.
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// Number of nodes allocated.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check whether the arena holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate over all nodes with their ids.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, node)| (NodeId(i), node))
    }

    /// Add an edge from `source` to `sink`.
    ///
    /// Fails with [`Error::EdgeExists`] if the edge is already present, in
    /// which case neither node is touched.
    pub fn add_edge(&mut self, source: NodeId, sink: NodeId) -> Result<()> {
        if self.nodes[source.0].has_outgoing_edge(sink) {
            return Err(Error::EdgeExists);
        }

        self.nodes[source.0].outgoing.insert(sink);
        self.nodes[sink.0].incoming.insert(source);
        Ok(())
    }

    /// Remove the edge from `source` to `sink`.
    ///
    /// Fails with [`Error::EdgeUndefined`] if there is no such edge.
    pub fn remove_edge(&mut self, source: NodeId, sink: NodeId) -> Result<()> {
        if !self.nodes[source.0].has_outgoing_edge(sink) {
            return Err(Error::EdgeUndefined);
        }

        self.nodes[source.0].outgoing.shift_remove(&sink);
        self.nodes[sink.0].incoming.shift_remove(&source);
        Ok(())
    }

    /// Remove every edge leaving `id`.
    pub fn remove_all_outgoing_edges(&mut self, id: NodeId) {
        let sinks = std::mem::take(&mut self.nodes[id.0].outgoing);
        for sink in sinks {
            self.nodes[sink.0].incoming.shift_remove(&id);
        }
    }

    /// Remove every edge entering `id`.
    pub fn remove_all_incoming_edges(&mut self, id: NodeId) {
        let sources = std::mem::take(&mut self.nodes[id.0].incoming);
        for source in sources {
            self.nodes[source.0].outgoing.shift_remove(&id);
        }
    }

    /// Detach `id` from the graph by removing all of its edges.
    pub fn remove_all_edges(&mut self, id: NodeId) {
        self.remove_all_outgoing_edges(id);
        self.remove_all_incoming_edges(id);
    }
}

impl std::ops::Index<NodeId> for NodeArena {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }
}

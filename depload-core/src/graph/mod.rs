//! Dependency Graph
//!
//! This module implements the graph that records which units depend on which,
//! and the traversal that turns it into a load order.
//!
//! # Overview
//!
//! The dependency graph is a directed graph where:
//!
//! - Nodes represent named units and carry no payload
//! - Edges represent dependencies: if A depends on B, there is an edge from A to B
//!
//! Traversal walks the graph bottom-up in generations. Every node in a
//! generation has all of its dependencies in earlier generations, so a whole
//! generation can be loaded at once.
//!
//! # Design Decisions
//!
//! 1. Nodes live in an arena and refer to each other by index. Edges are
//!    stored as index sets in both directions, and only the arena writes
//!    them, so the two directions never drift apart.
//!
//! 2. The graph keeps key -> node and node -> key maps. Traversal works on
//!    node ids and converts back to keys when it emits a generation.
//!
//! 3. Acyclic graphs check for a cycle after every edge insertion and undo
//!    the edge when one is found. Graphs built without that check may hold
//!    cycles but refuse to be traversed.

mod directed;
mod node;
mod options;
mod traversal;

pub use directed::{DirectedGraph, Key};
pub use node::{Node, NodeArena, NodeId};
pub use options::GraphOptions;
pub use traversal::Generations;

//! Graph Options

use serde::Deserialize;

/// Construction options for a [`DirectedGraph`](super::DirectedGraph).
///
/// Deserializable so a host can embed it in its own configuration file;
/// missing fields take their default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GraphOptions {
    /// Reject any edge that would close a cycle.
    pub acyclic: bool,
}

impl GraphOptions {
    /// Options for a graph that tolerates cycles. Such a graph can be built
    /// but will refuse to be traversed.
    pub fn cyclic() -> Self {
        Self { acyclic: false }
    }
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self { acyclic: true }
    }
}

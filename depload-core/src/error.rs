//! Errors
//!
//! Every failure the crate can report is a variant of [`Error`]. Variants carry
//! the keys or counts involved so callers can match on them instead of parsing
//! messages, and [`Error::code`] exposes a stable snake-case code for logs and
//! host applications.

use std::path::PathBuf;

use thiserror::Error;

/// Boxed error returned by resolvers, activators and component factories.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised by the graph, the loader and the component layer.
#[derive(Debug, Error)]
pub enum Error {
    #[error("node {key} already exists")]
    NodeExists { key: String },

    #[error("node {key} is not in graph")]
    NodeUndefined { key: String },

    #[error("source node {key} is not in graph")]
    SourceNodeUndefined { key: String },

    #[error("sink node {key} is not in graph")]
    SinkNodeUndefined { key: String },

    #[error("edge already exists")]
    EdgeExists,

    #[error("edge does not exist")]
    EdgeUndefined,

    /// The edge was rolled back before this error was returned.
    #[error("edge {from} -> {to} creates a cycle in graph")]
    GraphCycle { from: String, to: String },

    /// `remaining` is the number of nodes that could not be scheduled.
    #[error("cannot traverse cyclic graph ({remaining} nodes unreachable from the dependency frontier)")]
    CyclicGraph { remaining: usize },

    #[error("mismatch between number of configs requested ({requested}) and configs returned ({returned})")]
    ConfigLengthMismatch { requested: usize, returned: usize },

    #[error("resolver failed: {0}")]
    Resolve(#[source] BoxError),

    #[error("activator failed: {0}")]
    Activate(#[source] BoxError),

    #[error("component {name} is not registered")]
    ComponentUndefined { name: String },

    #[error("component {name} is not in cache")]
    ComponentNotInCache { name: String },

    #[error("component {name} failed to build: {reason}")]
    ComponentInvalid {
        name: String,
        #[source]
        reason: BoxError,
    },

    #[error("failed to read manifest {path}: {source}")]
    ManifestRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse manifest {path}: {source}")]
    ManifestParse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl Error {
    /// Stable machine-readable code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Error::NodeExists { .. } => "node_exists",
            Error::NodeUndefined { .. } => "node_undefined",
            Error::SourceNodeUndefined { .. } => "source_node_undefined",
            Error::SinkNodeUndefined { .. } => "sink_node_undefined",
            Error::EdgeExists => "edge_exists",
            Error::EdgeUndefined => "edge_undefined",
            Error::GraphCycle { .. } => "graph_cycle",
            Error::CyclicGraph { .. } => "cyclic_graph",
            Error::ConfigLengthMismatch { .. } => "config_length_mismatch",
            Error::Resolve(_) => "resolve_failed",
            Error::Activate(_) => "activate_failed",
            Error::ComponentUndefined { .. } => "component_undefined",
            Error::ComponentNotInCache { .. } => "component_not_in_cache",
            Error::ComponentInvalid { .. } => "component_invalid",
            Error::ManifestRead { .. } => "manifest_read",
            Error::ManifestParse { .. } => "manifest_parse",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_error_kinds() {
        assert_eq!(Error::EdgeExists.code(), "edge_exists");
        assert_eq!(
            Error::GraphCycle {
                from: "c".into(),
                to: "a".into()
            }
            .code(),
            "graph_cycle"
        );
        assert_eq!(
            Error::ConfigLengthMismatch {
                requested: 2,
                returned: 1
            }
            .code(),
            "config_length_mismatch"
        );
    }

    #[test]
    fn messages_carry_context() {
        let err = Error::ConfigLengthMismatch {
            requested: 3,
            returned: 1,
        };
        assert_eq!(
            err.to_string(),
            "mismatch between number of configs requested (3) and configs returned (1)"
        );

        let err = Error::SinkNodeUndefined { key: "b".into() };
        assert_eq!(err.to_string(), "sink node b is not in graph");
    }

    #[test]
    fn collaborator_errors_keep_their_source() {
        use std::error::Error as _;

        let inner: BoxError = "disk on fire".into();
        let err = Error::Resolve(inner);
        assert_eq!(err.code(), "resolve_failed");
        assert_eq!(err.source().map(|s| s.to_string()).as_deref(), Some("disk on fire"));
    }
}

//! Depload Core
//!
//! This crate discovers the dependencies of a set of named units one layer at
//! a time and loads them bottom-up, running every unit whose dependencies are
//! satisfied concurrently. It implements:
//!
//! - A directed dependency graph with optional cycle rejection
//! - Generation traversal (reverse Kahn ordering)
//! - An incremental dependency loader driven by pluggable collaborators
//! - A component container built on top of the loader
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `graph`: Directed graph, node arena and generation traversal
//! - `loader`: Resolver/activator traits and the discovery loop
//! - `component`: Named component definitions, cache and instantiation
//! - `manifest`: Resolver reading dependency lists from JSON files
//! - `error`: Error type shared by every module
//!
//! # Example
//!
//! ```rust,ignore
//! use depload_core::{DependencyLoader, EachKey};
//! use futures_util::future::ready;
//!
//! let resolver = |names: Vec<String>| async move {
//!     Ok(names.iter().map(|name| deps_of(name)).collect())
//! };
//! let activator = EachKey(|name: String| async move {
//!     start(&name).await
//! });
//!
//! let mut loader = DependencyLoader::new(vec!["app".to_string()], resolver, activator);
//! loader.load().await?;
//! ```

pub mod component;
pub mod error;
pub mod graph;
pub mod loader;
pub mod manifest;

pub use component::{ComponentDefinition, ComponentLoader, ComponentSource, Components, Registry};
pub use error::{BoxError, Error, Result};
pub use graph::{DirectedGraph, GraphOptions};
pub use loader::{Activate, DependencyLoader, EachKey, Resolve};
pub use manifest::{Manifest, ManifestResolver};

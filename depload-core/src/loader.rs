//! Incremental Dependency Loader
//!
//! The loader learns the dependency graph as it goes: the dependencies of a
//! key are only known once the key itself has been resolved. Loading runs in
//! two strictly sequential phases.
//!
//! # Discovery
//!
//! Starting from the requested keys, each iteration:
//!
//! 1. adds the queued keys as nodes (keys already present are skipped),
//! 2. adds the queued edges (edges already present are skipped),
//! 3. asks the resolver for the dependencies of the keys added in *this*
//!    iteration only,
//! 4. queues every dependency not yet in the graph as a key, and every
//!    (key, dependency) pair as an edge, for the next iteration.
//!
//! The loop ends when both queues are empty. Every key is resolved exactly
//! once, so discovery terminates for any finite dependency relation. Cycles
//! are rejected by the graph as the edges come in.
//!
//! # Activation
//!
//! Once the full closure is known, the graph is traversed bottom-up and each
//! generation is handed to the activator. A generation is only started after
//! the previous one has been fully activated.

use std::future::Future;

use futures_util::future::try_join_all;
use futures_util::TryFutureExt;
use indexmap::IndexSet;
use tracing::{debug, instrument, trace};

use crate::error::{BoxError, Error, Result};
use crate::graph::{DirectedGraph, GraphOptions, Key};

/// Looks up the dependency names of a batch of keys.
///
/// Implementations must return exactly one list per requested key, in the
/// same order. An empty list means the key has no dependencies. Returning a
/// different number of lists fails the load with
/// [`Error::ConfigLengthMismatch`].
///
/// Any `Fn(Vec<K>) -> impl Future<Output = Result<Vec<Vec<K>>, BoxError>>`
/// closure is a resolver.
pub trait Resolve<K> {
    fn resolve(&self, keys: Vec<K>) -> impl Future<Output = Result<Vec<Vec<K>>, BoxError>> + Send;
}

impl<K, F, Fut> Resolve<K> for F
where
    F: Fn(Vec<K>) -> Fut,
    Fut: Future<Output = Result<Vec<Vec<K>>, BoxError>> + Send,
{
    fn resolve(&self, keys: Vec<K>) -> impl Future<Output = Result<Vec<Vec<K>>, BoxError>> + Send {
        (self)(keys)
    }
}

/// Builds one generation of keys.
///
/// Every key in the batch already has its dependencies built, and no key in
/// the batch depends on another, so implementations may build them
/// concurrently.
///
/// Any `Fn(Vec<K>) -> impl Future<Output = Result<(), BoxError>>` closure is
/// an activator. Wrap a per-key closure in [`EachKey`] to build the members
/// of a generation concurrently.
pub trait Activate<K> {
    fn activate(&self, keys: Vec<K>) -> impl Future<Output = Result<(), BoxError>> + Send;
}

impl<K, F, Fut> Activate<K> for F
where
    F: Fn(Vec<K>) -> Fut,
    Fut: Future<Output = Result<(), BoxError>> + Send,
{
    fn activate(&self, keys: Vec<K>) -> impl Future<Output = Result<(), BoxError>> + Send {
        (self)(keys)
    }
}

/// Activator that builds each key of a generation with its own future and
/// drives them all at once.
///
/// The first failure resolves the whole generation with that error; the
/// remaining futures of the generation are dropped.
#[derive(Debug, Clone, Copy)]
pub struct EachKey<F>(pub F);

impl<K, F, Fut> Activate<K> for EachKey<F>
where
    F: Fn(K) -> Fut,
    Fut: Future<Output = Result<(), BoxError>> + Send,
{
    fn activate(&self, keys: Vec<K>) -> impl Future<Output = Result<(), BoxError>> + Send {
        let pending = keys.into_iter().map(|key| (self.0)(key));
        try_join_all(pending).map_ok(|_| ())
    }
}

/// Discovers the dependency closure of a set of keys and activates it in
/// dependency order.
///
/// Each call to [`load`](DependencyLoader::load) builds a fresh graph, so a
/// loader can be reused. Calls must not overlap; `&mut self` enforces that.
pub struct DependencyLoader<K, R, A> {
    /// Keys loaded by [`load`](DependencyLoader::load).
    keys: Vec<K>,

    resolver: R,

    activator: A,

    options: GraphOptions,

    /// Graph built by the most recent load.
    graph: DirectedGraph<K>,
}

impl<K, R, A> DependencyLoader<K, R, A>
where
    K: Key,
    R: Resolve<K>,
    A: Activate<K>,
{
    /// Create a loader for `keys`.
    pub fn new(keys: impl IntoIterator<Item = K>, resolver: R, activator: A) -> Self {
        Self {
            keys: keys.into_iter().collect(),
            resolver,
            activator,
            options: GraphOptions::default(),
            graph: DirectedGraph::new(),
        }
    }

    /// Use `options` for graphs built by subsequent loads.
    pub fn with_options(mut self, options: GraphOptions) -> Self {
        self.options = options;
        self.graph = DirectedGraph::with_options(options);
        self
    }

    /// Keys loaded by [`load`](DependencyLoader::load).
    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    /// Graph built by the most recent load.
    ///
    /// After a failed load this holds whatever was discovered before the
    /// failure and should only be inspected, not reused.
    pub fn graph(&self) -> &DirectedGraph<K> {
        &self.graph
    }

    /// Load the keys the loader was created with.
    pub async fn load(&mut self) -> Result<()> {
        let keys = self.keys.clone();
        self.load_keys(keys).await
    }

    /// Discover the dependency closure of `keys`, then activate it
    /// generation by generation.
    #[instrument(skip_all)]
    pub async fn load_keys(&mut self, keys: impl IntoIterator<Item = K>) -> Result<()> {
        self.graph = DirectedGraph::with_options(self.options);
        self.load_dependency_graph(keys).await?;
        self.load_from_graph().await?;
        debug!(nodes = self.graph.len(), "load complete");
        Ok(())
    }

    /// Discovery phase: grow the graph until no new keys or edges appear.
    pub async fn load_dependency_graph(&mut self, keys: impl IntoIterator<Item = K>) -> Result<()> {
        let mut keys_to_add: Vec<K> = keys.into_iter().collect::<IndexSet<_>>().into_iter().collect();
        let mut edges_to_add: Vec<(K, K)> = Vec::new();
        let mut iteration = 0usize;

        while !keys_to_add.is_empty() || !edges_to_add.is_empty() {
            let mut added = Vec::with_capacity(keys_to_add.len());
            for key in keys_to_add {
                if self.graph.has(&key) {
                    trace!(key = %key, "already in graph");
                    continue;
                }
                self.graph.add(key.clone())?;
                added.push(key);
            }

            for (key, dependency) in &edges_to_add {
                if !self.graph.has_edge(key, dependency) {
                    self.graph.add_edge(key, dependency)?;
                }
            }

            debug!(
                iteration,
                keys = added.len(),
                edges = edges_to_add.len(),
                "discovery iteration"
            );

            let (next_keys, next_edges) = self.resolve_added(added).await?;
            keys_to_add = next_keys;
            edges_to_add = next_edges;
            iteration += 1;
        }

        Ok(())
    }

    /// Activation phase: hand each generation of the graph to the activator.
    pub async fn load_from_graph(&self) -> Result<()> {
        let activator = &self.activator;
        self.graph
            .traverse(move |keys| activator.activate(keys).map_err(Error::Activate))
            .await
    }

    /// Resolve the keys added in one iteration and queue what they reference.
    async fn resolve_added(&self, added: Vec<K>) -> Result<(Vec<K>, Vec<(K, K)>)> {
        if added.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }

        let dependencies = self
            .resolver
            .resolve(added.clone())
            .await
            .map_err(Error::Resolve)?;

        if dependencies.len() != added.len() {
            return Err(Error::ConfigLengthMismatch {
                requested: added.len(),
                returned: dependencies.len(),
            });
        }

        let mut next_keys = IndexSet::new();
        let mut next_edges = Vec::new();
        for (key, dependency_keys) in added.into_iter().zip(dependencies) {
            for dependency in dependency_keys {
                if !self.graph.has(&dependency) {
                    next_keys.insert(dependency.clone());
                }
                trace!(key = %key, dependency = %dependency, "discovered dependency");
                next_edges.push((key.clone(), dependency));
            }
        }

        Ok((next_keys.into_iter().collect(), next_edges))
    }
}

impl<K, R, A> std::fmt::Debug for DependencyLoader<K, R, A>
where
    K: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyLoader")
            .field("keys", &self.keys)
            .field("options", &self.options)
            .field("graph", &self.graph)
            .finish()
    }
}

//! Component Loader
//!
//! A ready-made resolver/activator pair for the common case of building named
//! components that receive their dependencies at construction time.
//!
//! A [`ComponentSource`] maps a name to a [`ComponentDefinition`]: the names
//! the component depends on plus a factory. [`ComponentLoader`] fetches
//! definitions on demand (caching each one), discovers the dependency
//! closure through them, and then builds components generation by
//! generation. Each factory is handed a [`Components`] view holding the
//! already-built instances of exactly the dependencies it declared.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use futures_util::future::{ready, try_join_all};
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::error::{BoxError, Error, Result};
use crate::loader::{DependencyLoader, EachKey, Resolve};

/// A built component.
pub type Instance = Arc<dyn Any + Send + Sync>;

type Factory = Arc<dyn Fn(&Components) -> Result<Instance, BoxError> + Send + Sync>;

/// What a component needs and how to build it.
#[derive(Clone)]
pub struct ComponentDefinition {
    dependencies: Vec<String>,
    factory: Factory,
}

impl ComponentDefinition {
    /// Define a component depending on `dependencies`, built by `factory`.
    pub fn new<T, F, I>(dependencies: I, factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&Components) -> Result<T, BoxError> + Send + Sync + 'static,
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let factory: Factory = Arc::new(move |deps: &Components| -> Result<Instance, BoxError> {
            Ok(Arc::new(factory(deps)?))
        });

        Self {
            dependencies: dependencies.into_iter().map(Into::into).collect(),
            factory,
        }
    }

    /// Names of the components this one is built from.
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }
}

impl fmt::Debug for ComponentDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDefinition")
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

/// Where component definitions come from.
///
/// A source may do I/O; [`ComponentLoader`] caches what it returns, so each
/// name is fetched at most once per loader.
pub trait ComponentSource: Send + Sync {
    fn definition(&self, name: &str) -> impl Future<Output = Result<ComponentDefinition>> + Send;
}

/// In-memory [`ComponentSource`].
#[derive(Debug, Default, Clone)]
pub struct Registry {
    definitions: HashMap<String, ComponentDefinition>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `definition` under `name`, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, definition: ComponentDefinition) -> &mut Self {
        self.definitions.insert(name.into(), definition);
        self
    }

    /// Builder form of [`Registry::register`].
    pub fn with(mut self, name: impl Into<String>, definition: ComponentDefinition) -> Self {
        self.register(name, definition);
        self
    }
}

impl ComponentSource for Registry {
    fn definition(&self, name: &str) -> impl Future<Output = Result<ComponentDefinition>> + Send {
        ready(
            self.definitions
                .get(name)
                .cloned()
                .ok_or_else(|| Error::ComponentUndefined {
                    name: name.to_string(),
                }),
        )
    }
}

/// Built components by name.
#[derive(Clone, Default)]
pub struct Components {
    instances: HashMap<String, Instance>,
}

impl Components {
    /// Get the component `name` as a `T`.
    ///
    /// Returns `None` if there is no such component or it is not a `T`.
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.instances.get(name)?.clone().downcast::<T>().ok()
    }

    /// Get the component `name` without downcasting.
    pub fn instance(&self, name: &str) -> Option<&Instance> {
        self.instances.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.instances.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.instances.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

impl fmt::Debug for Components {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.instances.keys()).finish()
    }
}

/// Definition cache and built instances, shared by the resolver and the
/// activator of one loader.
struct Cache<S> {
    source: S,
    definitions: DashMap<String, ComponentDefinition>,
    instances: RwLock<HashMap<String, Instance>>,
}

impl<S: ComponentSource> Cache<S> {
    fn cached_definition(&self, name: &str) -> Result<ComponentDefinition> {
        self.definitions
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::ComponentNotInCache {
                name: name.to_string(),
            })
    }

    async fn definition(&self, name: &str) -> Result<ComponentDefinition> {
        if let Ok(definition) = self.cached_definition(name) {
            return Ok(definition);
        }

        trace!(component = name, "fetching definition");
        let definition = self.source.definition(name).await?;
        self.definitions.insert(name.to_string(), definition.clone());
        Ok(definition)
    }

    /// Build `name` from its cached definition and already-built dependencies.
    fn build(&self, name: &str) -> Result<()> {
        let definition = self.cached_definition(name)?;

        let dependencies = {
            let built = self.instances.read();
            let instances = definition
                .dependencies
                .iter()
                .filter_map(|dep| Some((dep.clone(), built.get(dep)?.clone())))
                .collect();
            Components { instances }
        };

        let instance = (definition.factory)(&dependencies).map_err(|reason| Error::ComponentInvalid {
            name: name.to_string(),
            reason,
        })?;

        debug!(component = name, "built component");
        self.instances.write().insert(name.to_string(), instance);
        Ok(())
    }
}

/// Resolver that reads dependency names from component definitions.
struct DefinitionResolver<'a, S> {
    cache: &'a Cache<S>,
}

impl<S: ComponentSource> Resolve<String> for DefinitionResolver<'_, S> {
    fn resolve(&self, names: Vec<String>) -> impl Future<Output = Result<Vec<Vec<String>>, BoxError>> + Send {
        let cache = self.cache;
        async move {
            let definitions: Vec<ComponentDefinition> =
                try_join_all(names.iter().map(|name| cache.definition(name))).await?;
            Ok::<_, BoxError>(
                definitions
                    .into_iter()
                    .map(|definition| definition.dependencies)
                    .collect(),
            )
        }
    }
}

/// Builds a set of named components and everything they depend on.
pub struct ComponentLoader<S> {
    names: Vec<String>,
    cache: Cache<S>,
}

impl<S: ComponentSource> ComponentLoader<S> {
    /// Create a loader for `names`, drawing definitions from `source`.
    pub fn new<I>(names: I, source: S) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            cache: Cache {
                source,
                definitions: DashMap::new(),
                instances: RwLock::new(HashMap::new()),
            },
        }
    }

    /// Resolve and build every requested component and its dependencies.
    ///
    /// Returns all components built by this loader so far.
    pub async fn load(&self) -> Result<Components> {
        let cache = &self.cache;
        let resolver = DefinitionResolver { cache };
        let activator = EachKey(move |name: String| ready(cache.build(&name).map_err(BoxError::from)));

        DependencyLoader::new(self.names.iter().cloned(), resolver, activator)
            .load()
            .await?;

        Ok(self.components())
    }

    /// Snapshot of the components built so far.
    pub fn components(&self) -> Components {
        Components {
            instances: self.cache.instances.read().clone(),
        }
    }

    /// Check whether the definition of `name` has been fetched.
    pub fn has_definition(&self, name: &str) -> bool {
        self.cache.definitions.contains_key(name)
    }

    /// Get the cached definition of `name`.
    ///
    /// Fails with [`Error::ComponentNotInCache`] if it has not been fetched.
    pub fn cached_definition(&self, name: &str) -> Result<ComponentDefinition> {
        self.cache.cached_definition(name)
    }

    /// Get the definition of `name`, fetching and caching it if needed.
    pub async fn definition(&self, name: &str) -> Result<ComponentDefinition> {
        self.cache.definition(name).await
    }
}

impl<S> fmt::Debug for ComponentLoader<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentLoader")
            .field("names", &self.names)
            .field("cached_definitions", &self.cache.definitions.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::error::Error as _;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct TestModule {
        whoami: String,
        modules: Components,
    }

    fn test_module(name: &'static str, deps: &[&str], order: Arc<Mutex<Vec<String>>>) -> ComponentDefinition {
        ComponentDefinition::new(deps.to_vec(), move |modules| {
            order.lock().push(name.to_string());
            Ok(TestModule {
                whoami: name.to_string(),
                modules: modules.clone(),
            })
        })
    }

    fn test_registry(order: &Arc<Mutex<Vec<String>>>) -> Registry {
        Registry::new()
            .with("test1", test_module("test1", &["test2", "test3"], order.clone()))
            .with("test2", test_module("test2", &["test3"], order.clone()))
            .with("test3", test_module("test3", &[], order.clone()))
    }

    #[tokio::test]
    async fn builds_components_after_their_dependencies() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let loader = ComponentLoader::new(["test1"], test_registry(&order));

        let components = loader.load().await.unwrap();

        assert_eq!(*order.lock(), vec!["test3", "test2", "test1"]);
        assert_eq!(components.len(), 3);

        let test1 = components.get::<TestModule>("test1").unwrap();
        assert_eq!(test1.whoami, "test1");
        assert_eq!(test1.modules.len(), 2);
        assert_eq!(test1.modules.get::<TestModule>("test2").unwrap().whoami, "test2");
        assert_eq!(test1.modules.get::<TestModule>("test3").unwrap().whoami, "test3");

        let test3 = components.get::<TestModule>("test3").unwrap();
        assert!(test3.modules.is_empty());
    }

    #[tokio::test]
    async fn dependencies_share_one_instance() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let loader = ComponentLoader::new(["test1"], test_registry(&order));

        let components = loader.load().await.unwrap();

        let direct = components.get::<TestModule>("test3").unwrap();
        let via_test2 = components
            .get::<TestModule>("test2")
            .unwrap()
            .modules
            .get::<TestModule>("test3")
            .unwrap();
        assert!(Arc::ptr_eq(&direct, &via_test2));
    }

    #[tokio::test]
    async fn definitions_are_fetched_once() {
        struct Counting {
            inner: Registry,
            fetches: AtomicUsize,
        }

        impl ComponentSource for Counting {
            fn definition(&self, name: &str) -> impl Future<Output = Result<ComponentDefinition>> + Send {
                self.fetches.fetch_add(1, Ordering::SeqCst);
                self.inner.definition(name)
            }
        }

        let order = Arc::new(Mutex::new(Vec::new()));
        let loader = ComponentLoader::new(
            ["test1", "test2"],
            Counting {
                inner: test_registry(&order),
                fetches: AtomicUsize::new(0),
            },
        );

        loader.load().await.unwrap();
        assert_eq!(loader.cache.source.fetches.load(Ordering::SeqCst), 3);
        assert!(loader.has_definition("test3"));

        // reloading serves every definition from the cache
        loader.load().await.unwrap();
        assert_eq!(loader.cache.source.fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn unknown_component_fails_discovery() {
        let registry = Registry::new().with(
            "app",
            ComponentDefinition::new(["missing"], |_| Ok(())),
        );
        let loader = ComponentLoader::new(["app"], registry);

        let err = loader.load().await.unwrap_err();

        assert!(matches!(err, Error::Resolve(_)));
        let inner = err.source().and_then(|e| e.downcast_ref::<Error>()).unwrap();
        assert!(matches!(inner, Error::ComponentUndefined { name } if name == "missing"));
        assert!(loader.components().is_empty());
    }

    #[tokio::test]
    async fn factory_failure_is_reported_with_component_name() {
        let registry = Registry::new()
            .with("db", ComponentDefinition::new(Vec::<String>::new(), |_| Ok(42u32)))
            .with(
                "api",
                ComponentDefinition::new(["db"], |_| -> Result<(), BoxError> { Err("no port".into()) }),
            );
        let loader = ComponentLoader::new(["api"], registry);

        let err = loader.load().await.unwrap_err();

        let inner = err.source().and_then(|e| e.downcast_ref::<Error>()).unwrap();
        assert_eq!(inner.code(), "component_invalid");
        assert_eq!(inner.to_string(), "component api failed to build: no port");
        assert_eq!(*loader.components().get::<u32>("db").unwrap(), 42);
    }

    #[test]
    fn cached_definition_requires_fetch() {
        let loader = ComponentLoader::new(["x"], Registry::new());
        assert!(matches!(
            loader.cached_definition("x"),
            Err(Error::ComponentNotInCache { .. })
        ));
    }

    #[test]
    fn components_downcast_by_type() {
        let mut instances: HashMap<String, Instance> = HashMap::new();
        instances.insert("port".into(), Arc::new(8080u16));
        let components = Components { instances };

        assert_eq!(components.get::<u16>("port").map(|p| *p), Some(8080));
        assert!(components.get::<String>("port").is_none());
        assert!(components.get::<u16>("host").is_none());
        assert!(components.contains("port"));
    }
}

//! Turning resolved graphs into instances.

use std::any::{type_name, Any};
use std::fmt;
use std::sync::{Arc, Weak};

use ahash::AHashMap;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::cache_policy::CachePolicy;
use crate::catalog::TypeCatalog;
use crate::component::Dependency;
use crate::desire::{Desire, InjectionPoint};
use crate::error::{DiError, DiResult};
use crate::key::TypeKey;
use crate::lifecycle::LifecycleManager;
use crate::satisfaction::AnyArc;
use crate::solver::{BackEdgeMap, Graph};

type InstantiateFn = dyn Fn() -> DiResult<Option<AnyArc>> + Send + Sync;

/// A callable producing instances of one component.
///
/// `Ok(None)` is a null instance. Instantiators are cheap to clone and can
/// be called from any thread.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolver::{AnyArc, Instantiator, TypeKey};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU32, Ordering};
///
/// let calls = Arc::new(AtomicU32::new(0));
/// let counter = calls.clone();
/// let make = Instantiator::new(TypeKey::named("u32"), move || {
///     let value: AnyArc = Arc::new(counter.fetch_add(1, Ordering::SeqCst));
///     Ok(Some(value))
/// })
/// .memoize();
///
/// assert_eq!(*make.instantiate_as::<u32>().unwrap(), 0);
/// assert_eq!(*make.instantiate_as::<u32>().unwrap(), 0);
/// assert_eq!(calls.load(Ordering::SeqCst), 1);
/// ```
#[derive(Clone)]
pub struct Instantiator {
    ty: TypeKey,
    f: Arc<InstantiateFn>,
}

impl Instantiator {
    pub fn new<F>(ty: TypeKey, f: F) -> Self
    where
        F: Fn() -> DiResult<Option<AnyArc>> + Send + Sync + 'static,
    {
        Self { ty, f: Arc::new(f) }
    }

    pub fn instantiate(&self) -> DiResult<Option<AnyArc>> {
        (self.f)()
    }

    /// The type of the instances produced.
    pub fn instance_type(&self) -> &TypeKey {
        &self.ty
    }

    /// Wraps the instantiator so the delegate runs at most once. The first
    /// result, success or failure, is returned to every later caller.
    pub fn memoize(self) -> Instantiator {
        let cell: Arc<OnceCell<DiResult<Option<AnyArc>>>> = Arc::new(OnceCell::new());
        let inner = self.f;
        Instantiator::new(self.ty, move || cell.get_or_init(|| inner()).clone())
    }

    /// Instantiates and downcasts to `T`, failing on null.
    pub fn instantiate_as<T: Any + Send + Sync>(&self) -> DiResult<Arc<T>> {
        match self.instantiate()? {
            Some(value) => downcast(value, &self.ty),
            None => Err(DiError::Construction {
                ty: self.ty.clone(),
                message: "instantiator produced null".to_string(),
            }),
        }
    }
}

impl fmt::Debug for Instantiator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instantiator({})", self.ty)
    }
}

fn downcast<T: Any + Send + Sync>(value: AnyArc, ty: &TypeKey) -> DiResult<Arc<T>> {
    value
        .downcast::<T>()
        .map_err(|_| DiError::TypeMismatch(format!("{} is not a {}", ty, type_name::<T>())))
}

/// The resolved dependencies of one component, handed to its constructor.
///
/// Child instantiators are looked up lazily, so a constructor only pays
/// for the dependencies it actually touches, and a provider-mediated cycle
/// only closes when the provider is called.
pub struct Dependencies {
    container: Weak<ContainerInner>,
    back_edges: Arc<BackEdgeMap>,
    edges: Vec<(Dependency, Graph)>,
    lifecycle: Arc<LifecycleManager>,
}

impl Dependencies {
    fn container(&self, ty: &TypeKey) -> DiResult<InjectionContainer> {
        self.container
            .upgrade()
            .map(|inner| InjectionContainer { inner })
            .ok_or_else(|| DiError::Construction {
                ty: ty.clone(),
                message: "injection container has been dropped".to_string(),
            })
    }

    fn edge(&self, pred: impl Fn(&InjectionPoint) -> bool) -> Option<&(Dependency, Graph)> {
        self.edges
            .iter()
            .find(|(dep, _)| pred(dep.initial_desire().injection_point()))
    }

    /// The instantiator resolved for `desire`.
    pub fn instantiator(&self, desire: &Desire) -> DiResult<Instantiator> {
        let (_, node) = self
            .edges
            .iter()
            .find(|(dep, _)| dep.initial_desire() == desire)
            .ok_or_else(|| DiError::Construction {
                ty: desire.desired_type().clone(),
                message: format!("no resolved dependency for {}", desire),
            })?;
        let container = self.container(desire.desired_type())?;
        Ok(container.make_instantiator(node, &self.back_edges))
    }

    /// The instance injected at the point named `name`, or `None` if it
    /// is null and the point is nullable.
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> DiResult<Option<Arc<T>>> {
        let (dep, node) = self.edge(|ip| ip.name() == name).ok_or_else(|| {
            DiError::Construction {
                ty: TypeKey::named(type_name::<T>()),
                message: format!("no dependency named '{}'", name),
            }
        })?;
        let ip = dep.initial_desire().injection_point();
        let container = self.container(ip.declared_type())?;
        let instance = container.make_instantiator(node, &self.back_edges).instantiate()?;
        match instance {
            Some(value) => downcast(value, node.label().satisfaction().erased_type()).map(Some),
            None if ip.is_nullable() => Ok(None),
            None => Err(DiError::NullDependency(ip.clone())),
        }
    }

    /// Like [`get`](Self::get), but null is always an error.
    pub fn require<T: Any + Send + Sync>(&self, name: &str) -> DiResult<Arc<T>> {
        match self.get::<T>(name)? {
            Some(value) => Ok(value),
            None => {
                let ip = self
                    .edge(|ip| ip.name() == name)
                    .map(|(dep, _)| dep.initial_desire().injection_point().clone());
                match ip {
                    Some(ip) => Err(DiError::NullDependency(ip)),
                    None => Err(DiError::TypeMismatch(format!("missing dependency '{}'", name))),
                }
            }
        }
    }

    /// The instantiator injected for a `Provider<T>` dependency.
    pub fn provider(&self, name: &str) -> DiResult<Instantiator> {
        self.require::<Instantiator>(name).map(|p| Instantiator::clone(&p))
    }

    /// Names of the injection points with resolved dependencies.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.edges
            .iter()
            .map(|(dep, _)| dep.initial_desire().injection_point().name())
    }

    pub fn lifecycle(&self) -> &Arc<LifecycleManager> {
        &self.lifecycle
    }
}

struct ContainerInner {
    catalog: Arc<TypeCatalog>,
    default_policy: CachePolicy,
    cache: Mutex<AHashMap<Graph, Instantiator>>,
    lifecycle: Arc<LifecycleManager>,
}

/// Builds and caches instantiators for resolved graph nodes.
///
/// The cache is keyed by node, so structurally identical subgraphs (which
/// the merge pool collapses into one node) share one instantiator and,
/// when memoized, one instance.
#[derive(Clone)]
pub struct InjectionContainer {
    inner: Arc<ContainerInner>,
}

impl InjectionContainer {
    /// `default_policy` applies to components without a cache policy.
    pub fn new(catalog: Arc<TypeCatalog>, default_policy: CachePolicy) -> Self {
        Self {
            inner: Arc::new(ContainerInner {
                catalog,
                default_policy,
                cache: Mutex::new(AHashMap::new()),
                lifecycle: Arc::new(LifecycleManager::new()),
            }),
        }
    }

    pub fn default_policy(&self) -> CachePolicy {
        self.inner.default_policy
    }

    pub fn lifecycle(&self) -> &Arc<LifecycleManager> {
        &self.inner.lifecycle
    }

    /// Number of cached instantiators.
    pub fn cached(&self) -> usize {
        self.inner.cache.lock().len()
    }

    /// The instantiator for `node`, built on first request.
    ///
    /// Concurrent callers may both build one; the first to store it wins
    /// and the other is discarded.
    pub fn make_instantiator(&self, node: &Graph, back_edges: &Arc<BackEdgeMap>) -> Instantiator {
        if let Some(found) = self.inner.cache.lock().get(node) {
            return found.clone();
        }

        let mut edges: Vec<(Dependency, Graph)> = node.edges().to_vec();
        if let Some(extra) = back_edges.get(node) {
            edges.extend(extra.iter().map(|edge| (edge.label().clone(), edge.tail().clone())));
        }
        let deps = Dependencies {
            container: Arc::downgrade(&self.inner),
            back_edges: back_edges.clone(),
            edges,
            lifecycle: self.inner.lifecycle.clone(),
        };
        let component = node.label();
        let raw = component.satisfaction().make_instantiator(&self.inner.catalog, deps);
        let built = match component.cache_policy().or(self.inner.default_policy) {
            CachePolicy::Memoize => raw.memoize(),
            _ => raw,
        };
        tracing::trace!(component = %component, "built instantiator");

        self.inner.cache.lock().entry(node.clone()).or_insert(built).clone()
    }

    /// Runs lifecycle hooks and drops every cached instantiator.
    pub fn close(&self) {
        self.inner.lifecycle.close();
        self.inner.cache.lock().clear();
    }
}

impl fmt::Debug for InjectionContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjectionContainer")
            .field("default_policy", &self.inner.default_policy)
            .field("cached", &self.cached())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_memoized_failure_is_replayed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let failing = Instantiator::new(TypeKey::named("X"), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(DiError::Construction { ty: TypeKey::named("X"), message: "boom".into() })
        })
        .memoize();

        assert!(failing.instantiate().is_err());
        assert!(failing.instantiate().is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_instantiate_as_checks_type() {
        let make = Instantiator::new(TypeKey::named("u8"), || Ok(Some(Arc::new(1u8) as AnyArc)));
        assert!(make.instantiate_as::<u8>().is_ok());
        assert!(matches!(make.instantiate_as::<u16>(), Err(DiError::TypeMismatch(_))));

        let null = Instantiator::new(TypeKey::named("u8"), || Ok(None));
        assert!(null.instantiate_as::<u8>().is_err());
    }
}

//! The injector: a solver and a container behind one handle.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::binding::BindingFunctionBuilder;
use crate::catalog::TypeCatalog;
use crate::config::ResolverConfig;
use crate::container::{InjectionContainer, Instantiator};
use crate::context::ContextPattern;
use crate::error::{DiError, DiResult};
use crate::key::{key_of_type, TypeKey};
use crate::observer::ResolutionObserver;
use crate::qualifier::Qualifier;
use crate::rules::BindRule;
use crate::solver::DependencySolver;

/// Resolves root types on demand and hands out their instances.
///
/// Each root desire is resolved once; later requests reuse the node
/// already in the solver's graph. Resolution holds the solver lock, while
/// instantiation runs outside it, so constructors can call back into the
/// injector.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolver::{
///     AnyArc, BindRule, ContextPattern, InjectorBuilder, TypeCatalog, TypeKey, TypeSpec,
/// };
/// use std::sync::Arc;
///
/// struct Config { url: &'static str }
/// struct Database { url: &'static str }
///
/// let mut types = TypeCatalog::builder();
/// types.add(TypeSpec::class("Config").constructor(|_| Ok(Arc::new(Config { url: "mem://" }) as AnyArc)));
/// types.add(TypeSpec::interface("Storage"));
/// types.add(
///     TypeSpec::class("Database")
///         .extends("Storage")
///         .inject("config", "Config")
///         .constructor(|deps| {
///             let config = deps.require::<Config>("config")?;
///             Ok(Arc::new(Database { url: config.url }) as AnyArc)
///         }),
/// );
/// let catalog = types.build();
///
/// let injector = InjectorBuilder::new(catalog.clone())
///     .bind(ContextPattern::any(), BindRule::bind("Storage").to("Database").build(&catalog).unwrap())
///     .build();
///
/// let db = injector.instance::<Database>(&TypeKey::named("Storage")).unwrap();
/// assert_eq!(db.url, "mem://");
/// ```
pub struct Injector {
    catalog: Arc<TypeCatalog>,
    solver: Mutex<DependencySolver>,
    container: InjectionContainer,
}

impl Injector {
    pub fn builder(catalog: Arc<TypeCatalog>) -> InjectorBuilder {
        InjectorBuilder::new(catalog)
    }

    pub fn catalog(&self) -> &Arc<TypeCatalog> {
        &self.catalog
    }

    pub fn container(&self) -> &InjectionContainer {
        &self.container
    }

    /// The instantiator for the root desire of `ty`, resolving it first if
    /// it is not in the graph yet.
    pub fn instantiator(&self, qualifier: Option<Qualifier>, ty: &TypeKey) -> DiResult<Instantiator> {
        let desire = self.catalog.root_desire(ty, qualifier);
        let (node, back_edges) = {
            let mut solver = self.solver.lock();
            let node = match solver.root_node(&desire) {
                Some(node) => node,
                None => {
                    solver.resolve(desire.clone())?;
                    solver.root_node(&desire).ok_or_else(|| {
                        DiError::InvalidGraph(format!("resolved {} but found no root edge", desire))
                    })?
                }
            };
            (node, solver.back_edges().clone())
        };
        Ok(self.container.make_instantiator(&node, &back_edges))
    }

    /// An instance of `ty`, downcast to `T`.
    pub fn instance<T: Any + Send + Sync>(&self, ty: &TypeKey) -> DiResult<Arc<T>> {
        self.instantiator(None, ty)?.instantiate_as::<T>()
    }

    /// An instance of `ty` under `qualifier`.
    pub fn qualified_instance<T: Any + Send + Sync>(&self, qualifier: Qualifier, ty: &TypeKey) -> DiResult<Arc<T>> {
        self.instantiator(Some(qualifier), ty)?.instantiate_as::<T>()
    }

    /// An instance of the type registered under `T`'s own name.
    pub fn get<T: Any + Send + Sync>(&self) -> DiResult<Arc<T>> {
        self.instance::<T>(&key_of_type::<T>())
    }

    /// Runs `f` with the solver locked.
    pub fn with_solver<R>(&self, f: impl FnOnce(&DependencySolver) -> R) -> R {
        f(&self.solver.lock())
    }

    /// Runs the container's shutdown hooks.
    pub fn close(&self) {
        tracing::info!("closing injector");
        self.container.close();
    }
}

impl fmt::Debug for Injector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injector")
            .field("types", &self.catalog.len())
            .field("container", &self.container)
            .finish()
    }
}

/// Assembles an [`Injector`] from bind rules, configuration and observers.
pub struct InjectorBuilder {
    catalog: Arc<TypeCatalog>,
    rules: BindingFunctionBuilder,
    config: ResolverConfig,
    observers: Vec<Arc<dyn ResolutionObserver>>,
}

impl InjectorBuilder {
    pub fn new(catalog: Arc<TypeCatalog>) -> Self {
        Self {
            rules: BindingFunctionBuilder::new(catalog.clone()),
            catalog,
            config: ResolverConfig::default(),
            observers: Vec::new(),
        }
    }

    /// Adds a rule that applies where `pattern` matches the context.
    pub fn bind(mut self, pattern: ContextPattern, rule: BindRule) -> Self {
        self.rules.bind(pattern, rule);
        self
    }

    pub fn config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn ResolutionObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn build(self) -> Injector {
        let mut solver = DependencySolver::builder(self.catalog.clone())
            .standard_functions(&self.rules)
            .config(&self.config);
        for observer in self.observers {
            solver = solver.observer(observer);
        }
        tracing::debug!(rules = self.rules.rules().len(), config = %self.config, "built injector");
        Injector {
            container: InjectionContainer::new(self.catalog.clone(), self.config.container_policy),
            solver: Mutex::new(solver.build()),
            catalog: self.catalog,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache_policy::CachePolicy;
    use crate::catalog::TypeSpec;
    use crate::satisfaction::AnyArc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Counter(usize);

    fn counting_catalog(policy: CachePolicy, built: Arc<AtomicUsize>) -> Arc<TypeCatalog> {
        let mut types = TypeCatalog::builder();
        types.add(TypeSpec::class("Counter").cache_policy(policy).constructor(move |_| {
            Ok(Arc::new(Counter(built.fetch_add(1, Ordering::SeqCst))) as AnyArc)
        }));
        types.build()
    }

    #[test]
    fn test_root_resolved_once() {
        let built = Arc::new(AtomicUsize::new(0));
        let injector = InjectorBuilder::new(counting_catalog(CachePolicy::NoPreference, built.clone())).build();

        injector.instance::<Counter>(&TypeKey::named("Counter")).unwrap();
        injector.instance::<Counter>(&TypeKey::named("Counter")).unwrap();

        assert_eq!(built.load(Ordering::SeqCst), 2);
        assert_eq!(injector.with_solver(|solver| solver.graph().edges().len()), 1);
    }

    #[test]
    fn test_memoized_class_is_shared() {
        let built = Arc::new(AtomicUsize::new(0));
        let injector = InjectorBuilder::new(counting_catalog(CachePolicy::Memoize, built.clone())).build();

        let a = injector.instance::<Counter>(&TypeKey::named("Counter")).unwrap();
        let b = injector.instance::<Counter>(&TypeKey::named("Counter")).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.0, 0);
    }

    #[test]
    fn test_container_policy_from_config() {
        let built = Arc::new(AtomicUsize::new(0));
        let injector = InjectorBuilder::new(counting_catalog(CachePolicy::NoPreference, built.clone()))
            .config(ResolverConfig::default().with_container_policy(CachePolicy::Memoize))
            .build();

        injector.instance::<Counter>(&TypeKey::named("Counter")).unwrap();
        injector.instance::<Counter>(&TypeKey::named("Counter")).unwrap();
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unknown_type_is_unresolvable() {
        let injector = InjectorBuilder::new(TypeCatalog::builder().build()).build();
        let err = injector.instance::<Counter>(&TypeKey::named("Nope")).unwrap_err();
        assert!(err.is_resolution_error());
    }
}

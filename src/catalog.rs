//! Type metadata: the resolver's view of the types it can wire together.
//!
//! Resolution never inspects Rust types directly. Everything it needs to
//! know about a type (what it extends, whether it can be constructed, what
//! it depends on and which defaults it declares) is registered up front as
//! a [`TypeSpec`] and frozen into a [`TypeCatalog`].

use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use ahash::{AHashMap, AHashSet};

use crate::cache_policy::CachePolicy;
use crate::container::Dependencies;
use crate::desire::{Desire, InjectionPoint};
use crate::error::DiResult;
use crate::key::TypeKey;
use crate::qualifier::Qualifier;
use crate::satisfaction::{AnyArc, Provider, Satisfaction};

/// Constructor closure for a concrete type.
pub type Constructor = Arc<dyn Fn(&Dependencies) -> DiResult<AnyArc> + Send + Sync>;

/// Constructor closure for a provider class.
pub type ProviderConstructor = Arc<dyn Fn(&Dependencies) -> DiResult<Arc<dyn Provider>> + Send + Sync>;

/// Defaults declared on a type or on a qualifier kind.
///
/// At most one of the three is consulted, in the order implementation,
/// provider, instance.
#[derive(Clone, Default)]
pub struct Defaults {
    implementation: Option<TypeKey>,
    provider: Option<TypeKey>,
    instance: Option<AnyArc>,
}

impl Defaults {
    pub fn implementation(&self) -> Option<&TypeKey> {
        self.implementation.as_ref()
    }

    pub fn provider(&self) -> Option<&TypeKey> {
        self.provider.as_ref()
    }

    pub fn instance(&self) -> Option<&AnyArc> {
        self.instance.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.implementation.is_none() && self.provider.is_none() && self.instance.is_none()
    }
}

impl fmt::Debug for Defaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Defaults")
            .field("implementation", &self.implementation)
            .field("provider", &self.provider)
            .field("instance", &self.instance.as_ref().map(|_| "<instance>"))
            .finish()
    }
}

/// Declaration of one type.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolver::{TypeSpec, TypeCatalog, TypeKey, CachePolicy};
/// use std::sync::Arc;
///
/// struct Pool;
/// struct Repository { pool: Arc<Pool> }
///
/// let mut types = TypeCatalog::builder();
/// types.add(TypeSpec::class("Pool")
///     .cache_policy(CachePolicy::Memoize)
///     .constructor(|_| Ok(Arc::new(Pool))));
/// types.add(TypeSpec::interface("Store").default_implementation("Repository"));
/// types.add(TypeSpec::class("Repository")
///     .extends("Store")
///     .inject("pool", "Pool")
///     .constructor(|deps| Ok(Arc::new(Repository { pool: deps.require::<Pool>("pool")? }))));
/// let catalog = types.build();
///
/// assert!(catalog.is_assignable(&TypeKey::named("Repository"), &TypeKey::named("Store")));
/// assert_eq!(catalog.dependencies(&TypeKey::named("Repository")).len(), 1);
/// ```
pub struct TypeSpec {
    key: TypeKey,
    supertypes: Vec<TypeKey>,
    instantiable: bool,
    injection_points: Vec<InjectionPoint>,
    defaults: Defaults,
    cache_policy: CachePolicy,
    constructor: Option<Constructor>,
    provider_constructor: Option<ProviderConstructor>,
}

impl TypeSpec {
    fn new(key: TypeKey, instantiable: bool) -> Self {
        Self {
            key,
            supertypes: Vec::new(),
            instantiable,
            injection_points: Vec::new(),
            defaults: Defaults::default(),
            cache_policy: CachePolicy::NoPreference,
            constructor: None,
            provider_constructor: None,
        }
    }

    /// A concrete, instantiable type.
    pub fn class(key: impl Into<TypeKey>) -> Self {
        Self::new(key.into(), true)
    }

    /// An abstract type; only reachable through bindings or defaults.
    pub fn interface(key: impl Into<TypeKey>) -> Self {
        Self::new(key.into(), false)
    }

    /// Adds a direct supertype.
    pub fn extends(mut self, supertype: impl Into<TypeKey>) -> Self {
        self.supertypes.push(supertype.into());
        self
    }

    /// Declares an unqualified dependency.
    pub fn inject(self, name: &str, ty: impl Into<TypeKey>) -> Self {
        self.inject_with(name, ty, |ip| ip)
    }

    /// Declares a qualified dependency.
    pub fn inject_qualified(self, name: &str, ty: impl Into<TypeKey>, qualifier: Qualifier) -> Self {
        self.inject_with(name, ty, |ip| ip.qualified(qualifier))
    }

    /// Declares a dependency that accepts null.
    pub fn inject_nullable(self, name: &str, ty: impl Into<TypeKey>) -> Self {
        self.inject_with(name, ty, |ip| ip.nullable())
    }

    /// Declares a dependency, letting `configure` adjust the injection point.
    pub fn inject_with(
        mut self,
        name: &str,
        ty: impl Into<TypeKey>,
        configure: impl FnOnce(InjectionPoint) -> InjectionPoint,
    ) -> Self {
        let ip = InjectionPoint::new(Some(self.key.clone()), name, ty.into());
        self.injection_points.push(configure(ip));
        self
    }

    pub fn default_implementation(mut self, ty: impl Into<TypeKey>) -> Self {
        self.defaults.implementation = Some(ty.into());
        self
    }

    pub fn default_provider(mut self, provider: impl Into<TypeKey>) -> Self {
        self.defaults.provider = Some(provider.into());
        self
    }

    pub fn default_instance<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.defaults.instance = Some(Arc::new(value));
        self
    }

    /// Class-level cache policy.
    pub fn cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = policy;
        self
    }

    /// Registers the constructor used to build instances.
    pub fn constructor<F>(mut self, ctor: F) -> Self
    where
        F: Fn(&Dependencies) -> DiResult<AnyArc> + Send + Sync + 'static,
    {
        self.constructor = Some(Arc::new(ctor));
        self
    }

    /// Registers the constructor of a provider class.
    pub fn provider_constructor<F>(mut self, ctor: F) -> Self
    where
        F: Fn(&Dependencies) -> DiResult<Arc<dyn Provider>> + Send + Sync + 'static,
    {
        self.provider_constructor = Some(Arc::new(ctor));
        self
    }
}

/// Defaults attached to a qualifier kind.
pub struct QualifierSpec {
    kind: Arc<str>,
    defaults: Defaults,
}

impl QualifierSpec {
    pub fn new(kind: impl AsRef<str>) -> Self {
        Self { kind: Arc::from(kind.as_ref()), defaults: Defaults::default() }
    }

    pub fn default_implementation(mut self, ty: impl Into<TypeKey>) -> Self {
        self.defaults.implementation = Some(ty.into());
        self
    }

    pub fn default_provider(mut self, provider: impl Into<TypeKey>) -> Self {
        self.defaults.provider = Some(provider.into());
        self
    }

    pub fn default_instance<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.defaults.instance = Some(Arc::new(value));
        self
    }
}

/// Frozen metadata for one type.
pub struct TypeInfo {
    key: TypeKey,
    supertypes: Vec<TypeKey>,
    instantiable: bool,
    dependencies: Vec<Desire>,
    defaults: Defaults,
    cache_policy: CachePolicy,
    constructor: Option<Constructor>,
    provider_constructor: Option<ProviderConstructor>,
}

impl TypeInfo {
    pub fn key(&self) -> &TypeKey {
        &self.key
    }

    /// Direct supertypes.
    pub fn supertypes(&self) -> &[TypeKey] {
        &self.supertypes
    }

    pub fn is_instantiable(&self) -> bool {
        self.instantiable
    }

    pub fn dependencies(&self) -> &[Desire] {
        &self.dependencies
    }

    pub fn defaults(&self) -> &Defaults {
        &self.defaults
    }

    pub fn cache_policy(&self) -> CachePolicy {
        self.cache_policy
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("key", &self.key)
            .field("supertypes", &self.supertypes)
            .field("instantiable", &self.instantiable)
            .field("dependencies", &self.dependencies)
            .field("defaults", &self.defaults)
            .field("cache_policy", &self.cache_policy)
            .finish()
    }
}

/// Collects [`TypeSpec`]s and [`QualifierSpec`]s before freezing them.
#[derive(Default)]
pub struct TypeCatalogBuilder {
    types: Vec<TypeSpec>,
    qualifiers: Vec<QualifierSpec>,
}

impl TypeCatalogBuilder {
    /// Registers a type. A later registration of the same key replaces
    /// the earlier one.
    pub fn add(&mut self, spec: TypeSpec) -> &mut Self {
        self.types.push(spec);
        self
    }

    pub fn add_qualifier(&mut self, spec: QualifierSpec) -> &mut Self {
        self.qualifiers.push(spec);
        self
    }

    /// Freezes the catalog and pre-computes every type's dependency desires.
    pub fn build(self) -> Arc<TypeCatalog> {
        let mut types = AHashMap::with_capacity(self.types.len());
        let mut points = AHashMap::with_capacity(self.types.len());
        for spec in self.types {
            points.insert(spec.key.clone(), spec.injection_points);
            types.insert(
                spec.key.clone(),
                TypeInfo {
                    key: spec.key,
                    supertypes: spec.supertypes,
                    instantiable: spec.instantiable,
                    dependencies: Vec::new(),
                    defaults: spec.defaults,
                    cache_policy: spec.cache_policy,
                    constructor: spec.constructor,
                    provider_constructor: spec.provider_constructor,
                },
            );
        }
        let qualifiers = self
            .qualifiers
            .into_iter()
            .map(|q| (q.kind, q.defaults))
            .collect();

        let mut catalog = TypeCatalog { types, qualifiers };
        let resolved: Vec<(TypeKey, Vec<Desire>)> = points
            .into_iter()
            .map(|(key, ips)| {
                let desires = ips.into_iter().map(|ip| catalog.desire(ip)).collect();
                (key, desires)
            })
            .collect();
        for (key, desires) in resolved {
            if let Some(info) = catalog.types.get_mut(&key) {
                info.dependencies = desires;
            }
        }
        Arc::new(catalog)
    }
}

/// Immutable registry of type metadata shared by every resolver component.
pub struct TypeCatalog {
    types: AHashMap<TypeKey, TypeInfo>,
    qualifiers: AHashMap<Arc<str>, Defaults>,
}

impl TypeCatalog {
    pub fn builder() -> TypeCatalogBuilder {
        TypeCatalogBuilder::default()
    }

    pub fn info(&self, ty: &TypeKey) -> Option<&TypeInfo> {
        self.types.get(ty)
    }

    pub fn contains(&self, ty: &TypeKey) -> bool {
        self.types.contains_key(ty)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn is_instantiable(&self, ty: &TypeKey) -> bool {
        self.info(ty).map_or(false, |info| info.instantiable)
    }

    /// A class satisfaction for `ty` if it is instantiable.
    pub fn class_satisfaction(&self, ty: &TypeKey) -> Option<Satisfaction> {
        self.is_instantiable(ty).then(|| Satisfaction::Class(ty.clone()))
    }

    /// The initial desire for an injection point.
    pub fn desire(&self, ip: InjectionPoint) -> Desire {
        let ty = ip.declared_type().clone();
        let satisfaction = self.class_satisfaction(&ty);
        Desire::from_parts(ip, ty, satisfaction)
    }

    /// The desire for a root request.
    pub fn root_desire(&self, ty: &TypeKey, qualifier: Option<Qualifier>) -> Desire {
        self.desire(InjectionPoint::root(ty.clone(), qualifier))
    }

    /// Dependency desires of `ty`; empty for unknown types.
    pub fn dependencies(&self, ty: &TypeKey) -> &[Desire] {
        match self.info(ty) {
            Some(info) => info.dependencies(),
            None => &[],
        }
    }

    pub fn cache_policy(&self, ty: &TypeKey) -> CachePolicy {
        self.info(ty).map_or(CachePolicy::NoPreference, |info| info.cache_policy)
    }

    pub fn constructor(&self, ty: &TypeKey) -> Option<Constructor> {
        self.info(ty).and_then(|info| info.constructor.clone())
    }

    pub fn provider_constructor(&self, ty: &TypeKey) -> Option<ProviderConstructor> {
        self.info(ty).and_then(|info| info.provider_constructor.clone())
    }

    pub fn type_defaults(&self, ty: &TypeKey) -> Option<&Defaults> {
        self.info(ty).map(|info| &info.defaults)
    }

    pub fn qualifier_defaults(&self, kind: &str) -> Option<&Defaults> {
        self.qualifiers.get(kind)
    }

    /// All transitive supertypes of `ty`, nearest first, excluding `ty`.
    pub fn supertypes(&self, ty: &TypeKey) -> Vec<TypeKey> {
        self.walk_supertypes(ty)
            .into_iter()
            .filter(|(_, distance)| *distance > 0)
            .map(|(key, _)| key)
            .collect()
    }

    /// Whether a `sub` can be used where a `sup` is expected.
    pub fn is_assignable(&self, sub: &TypeKey, sup: &TypeKey) -> bool {
        self.type_distance(sub, sup).is_some()
    }

    /// Number of supertype hops from `sub` up to `sup`; `Some(0)` when equal.
    pub fn type_distance(&self, sub: &TypeKey, sup: &TypeKey) -> Option<usize> {
        if sub == sup {
            return Some(0);
        }
        self.walk_supertypes(sub)
            .into_iter()
            .find(|(key, _)| key == sup)
            .map(|(_, distance)| distance)
    }

    /// Types strictly between `sub` and `sup` in the hierarchy.
    pub fn types_between(&self, sub: &TypeKey, sup: &TypeKey) -> Vec<TypeKey> {
        self.supertypes(sub)
            .into_iter()
            .filter(|t| t != sup && self.is_assignable(t, sup))
            .collect()
    }

    // Breadth-first walk; each type is reported once at its shortest distance.
    fn walk_supertypes(&self, ty: &TypeKey) -> Vec<(TypeKey, usize)> {
        let mut seen = AHashSet::new();
        let mut order = Vec::new();
        let mut queue = VecDeque::new();
        seen.insert(ty.clone());
        queue.push_back((ty.clone(), 0usize));
        while let Some((current, distance)) = queue.pop_front() {
            if let Some(info) = self.info(&current) {
                for sup in &info.supertypes {
                    if seen.insert(sup.clone()) {
                        queue.push_back((sup.clone(), distance + 1));
                    }
                }
            }
            order.push((current, distance));
        }
        order
    }
}

impl fmt::Debug for TypeCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeCatalog")
            .field("types", &format!("{} types", self.types.len()))
            .field("qualifiers", &format!("{} qualifier kinds", self.qualifiers.len()))
            .finish()
    }
}

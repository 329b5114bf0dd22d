//! Satisfactions: terminal recipes for producing a dependency value.

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::cache_policy::CachePolicy;
use crate::catalog::TypeCatalog;
use crate::container::{Dependencies, Instantiator};
use crate::desire::Desire;
use crate::error::{DiError, DiResult};
use crate::key::TypeKey;

/// Type-erased shared instance.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

/// A user supplied object that produces instances on demand.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolver::{Provider, DiResult, AnyArc};
/// use std::sync::Arc;
///
/// struct Counter;
///
/// impl Provider for Counter {
///     fn get(&self) -> DiResult<AnyArc> {
///         Ok(Arc::new(42u32))
///     }
/// }
///
/// let value = Counter.get().unwrap();
/// assert_eq!(value.downcast_ref::<u32>(), Some(&42));
/// ```
pub trait Provider: Send + Sync {
    /// Produces an instance.
    fn get(&self) -> DiResult<AnyArc>;
}

/// Discriminant of a [`Satisfaction`], used for diagnostics and exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SatisfactionKind {
    Class,
    Instance,
    ProviderClass,
    ProviderInstance,
    ProviderInjection,
    Null,
}

/// A terminal, instantiable description of how to produce a value.
///
/// Satisfactions compare structurally: two class satisfactions for the same
/// type are equal, which is what lets the merge pool share their nodes.
/// Instance-backed variants compare by the identity of the wrapped value.
#[derive(Clone)]
pub enum Satisfaction {
    /// Construct the type with its registered constructor
    Class(TypeKey),
    /// Use a pre-built instance
    Instance { ty: TypeKey, value: AnyArc },
    /// Construct a provider class, then ask it for the instance
    ProviderClass { provider: TypeKey, provided: TypeKey },
    /// Ask an existing provider for the instance
    ProviderInstance { provided: TypeKey, provider: Arc<dyn Provider> },
    /// Inject a `Provider<T>` backed by the resolved graph for `T`
    ProviderInjection { ty: TypeKey, provided: Arc<Desire> },
    /// Satisfy with null
    Null(TypeKey),
}

impl Satisfaction {
    pub fn class(ty: TypeKey) -> Self {
        Satisfaction::Class(ty)
    }

    pub fn instance<T: Any + Send + Sync>(ty: TypeKey, value: T) -> Self {
        Satisfaction::Instance { ty, value: Arc::new(value) }
    }

    pub fn provider_class(provider: TypeKey, provided: TypeKey) -> Self {
        Satisfaction::ProviderClass { provider, provided }
    }

    pub fn provider_instance(provided: TypeKey, provider: Arc<dyn Provider>) -> Self {
        Satisfaction::ProviderInstance { provided, provider }
    }

    pub fn null(ty: TypeKey) -> Self {
        Satisfaction::Null(ty)
    }

    /// Satisfaction for a `Provider<T>` desire whose single dependency is
    /// `provided` (a desire for `T`).
    pub(crate) fn provider_injection(provided: Desire) -> Self {
        Satisfaction::ProviderInjection {
            ty: TypeKey::provider_of(provided.desired_type()),
            provided: Arc::new(provided),
        }
    }

    pub fn kind(&self) -> SatisfactionKind {
        match self {
            Satisfaction::Class(_) => SatisfactionKind::Class,
            Satisfaction::Instance { .. } => SatisfactionKind::Instance,
            Satisfaction::ProviderClass { .. } => SatisfactionKind::ProviderClass,
            Satisfaction::ProviderInstance { .. } => SatisfactionKind::ProviderInstance,
            Satisfaction::ProviderInjection { .. } => SatisfactionKind::ProviderInjection,
            Satisfaction::Null(_) => SatisfactionKind::Null,
        }
    }

    /// The runtime type of the produced value.
    pub fn erased_type(&self) -> &TypeKey {
        match self {
            Satisfaction::Class(ty) => ty,
            Satisfaction::Instance { ty, .. } => ty,
            Satisfaction::ProviderClass { provided, .. } => provided,
            Satisfaction::ProviderInstance { provided, .. } => provided,
            Satisfaction::ProviderInjection { ty, .. } => ty,
            Satisfaction::Null(ty) => ty,
        }
    }

    /// The desires this satisfaction needs before it can be instantiated.
    pub fn dependencies(&self, catalog: &TypeCatalog) -> Vec<Desire> {
        match self {
            Satisfaction::Class(ty) => catalog.dependencies(ty).to_vec(),
            Satisfaction::ProviderClass { provider, .. } => catalog.dependencies(provider).to_vec(),
            Satisfaction::ProviderInjection { provided, .. } => vec![Desire::clone(provided)],
            Satisfaction::Instance { .. }
            | Satisfaction::ProviderInstance { .. }
            | Satisfaction::Null(_) => Vec::new(),
        }
    }

    /// Cache policy declared by the satisfied type itself.
    pub fn default_cache_policy(&self, catalog: &TypeCatalog) -> CachePolicy {
        match self {
            Satisfaction::Class(ty) => catalog.cache_policy(ty),
            Satisfaction::ProviderClass { provider, .. } => catalog.cache_policy(provider),
            _ => CachePolicy::NoPreference,
        }
    }

    /// Builds the raw instantiator given the (lazily resolved) dependencies.
    pub fn make_instantiator(&self, catalog: &TypeCatalog, deps: Dependencies) -> Instantiator {
        let ty = self.erased_type().clone();
        match self {
            Satisfaction::Class(class) => match catalog.constructor(class) {
                Some(ctor) => Instantiator::new(ty, move || ctor(&deps).map(Some)),
                None => missing_constructor(ty, class),
            },
            Satisfaction::Instance { value, .. } => {
                let value = value.clone();
                Instantiator::new(ty, move || Ok(Some(value.clone())))
            }
            Satisfaction::ProviderClass { provider, .. } => match catalog.provider_constructor(provider) {
                Some(ctor) => Instantiator::new(ty, move || {
                    let provider = ctor(&deps)?;
                    provider.get().map(Some)
                }),
                None => missing_constructor(ty, provider),
            },
            Satisfaction::ProviderInstance { provider, .. } => {
                let provider = provider.clone();
                Instantiator::new(ty, move || provider.get().map(Some))
            }
            Satisfaction::ProviderInjection { provided, .. } => {
                let provided = provided.clone();
                Instantiator::new(ty, move || {
                    let target = deps.instantiator(&provided)?;
                    Ok(Some(Arc::new(target) as AnyArc))
                })
            }
            Satisfaction::Null(_) => Instantiator::new(ty, || Ok(None)),
        }
    }
}

fn missing_constructor(ty: TypeKey, class: &TypeKey) -> Instantiator {
    let message = format!("no constructor registered for {}", class);
    let failing = ty.clone();
    Instantiator::new(ty, move || {
        Err(DiError::Construction { ty: failing.clone(), message: message.clone() })
    })
}

fn value_addr(value: &AnyArc) -> usize {
    Arc::as_ptr(value) as *const () as usize
}

fn provider_addr(provider: &Arc<dyn Provider>) -> usize {
    Arc::as_ptr(provider) as *const () as usize
}

impl PartialEq for Satisfaction {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Satisfaction::Class(a), Satisfaction::Class(b)) => a == b,
            (
                Satisfaction::Instance { ty: ta, value: va },
                Satisfaction::Instance { ty: tb, value: vb },
            ) => ta == tb && value_addr(va) == value_addr(vb),
            (
                Satisfaction::ProviderClass { provider: pa, provided: ta },
                Satisfaction::ProviderClass { provider: pb, provided: tb },
            ) => pa == pb && ta == tb,
            (
                Satisfaction::ProviderInstance { provided: ta, provider: pa },
                Satisfaction::ProviderInstance { provided: tb, provider: pb },
            ) => ta == tb && provider_addr(pa) == provider_addr(pb),
            (
                Satisfaction::ProviderInjection { provided: a, .. },
                Satisfaction::ProviderInjection { provided: b, .. },
            ) => a == b,
            (Satisfaction::Null(a), Satisfaction::Null(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Satisfaction {}

impl Hash for Satisfaction {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind().hash(state);
        match self {
            Satisfaction::Class(ty) | Satisfaction::Null(ty) => ty.hash(state),
            Satisfaction::Instance { ty, value } => {
                ty.hash(state);
                value_addr(value).hash(state);
            }
            Satisfaction::ProviderClass { provider, provided } => {
                provider.hash(state);
                provided.hash(state);
            }
            Satisfaction::ProviderInstance { provided, provider } => {
                provided.hash(state);
                provider_addr(provider).hash(state);
            }
            Satisfaction::ProviderInjection { provided, .. } => provided.hash(state),
        }
    }
}

impl fmt::Display for Satisfaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Satisfaction::Class(ty) => write!(f, "class {}", ty),
            Satisfaction::Instance { ty, .. } => write!(f, "instance of {}", ty),
            Satisfaction::ProviderClass { provider, provided } => {
                write!(f, "provider class {} for {}", provider, provided)
            }
            Satisfaction::ProviderInstance { provided, .. } => write!(f, "provider instance for {}", provided),
            Satisfaction::ProviderInjection { ty, .. } => write!(f, "injected {}", ty),
            Satisfaction::Null(ty) => write!(f, "null {}", ty),
        }
    }
}

impl fmt::Debug for Satisfaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_satisfactions_are_structural() {
        assert_eq!(Satisfaction::class(TypeKey::named("A")), Satisfaction::class(TypeKey::named("A")));
        assert_ne!(Satisfaction::class(TypeKey::named("A")), Satisfaction::null(TypeKey::named("A")));
    }

    #[test]
    fn test_instances_compare_by_identity() {
        let shared: AnyArc = Arc::new(5u8);
        let a = Satisfaction::Instance { ty: TypeKey::named("u8"), value: shared.clone() };
        let b = Satisfaction::Instance { ty: TypeKey::named("u8"), value: shared };
        let c = Satisfaction::instance(TypeKey::named("u8"), 5u8);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_erased_types() {
        let provider = Satisfaction::provider_class(TypeKey::named("Factory"), TypeKey::named("Conn"));
        assert_eq!(provider.erased_type(), &TypeKey::named("Conn"));
        assert_eq!(provider.kind(), SatisfactionKind::ProviderClass);
    }
}

//! Desires: unresolved dependency requests and their rewrite history.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::catalog::TypeCatalog;
use crate::key::TypeKey;
use crate::qualifier::Qualifier;
use crate::satisfaction::Satisfaction;

/// The place a dependency is injected into.
///
/// The resolver treats injection points as opaque apart from equality and
/// the attributes exposed here. `owner` is `None` for synthetic points such
/// as root requests.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct InjectionPoint {
    owner: Option<TypeKey>,
    name: Arc<str>,
    ty: TypeKey,
    qualifier: Option<Qualifier>,
    nullable: bool,
}

impl InjectionPoint {
    /// Creates an injection point named `name` on `owner`.
    pub fn new(owner: Option<TypeKey>, name: impl AsRef<str>, ty: TypeKey) -> Self {
        Self {
            owner,
            name: Arc::from(name.as_ref()),
            ty,
            qualifier: None,
            nullable: false,
        }
    }

    /// A synthetic injection point for a root request.
    pub fn root(ty: TypeKey, qualifier: Option<Qualifier>) -> Self {
        let mut ip = Self::new(None, "<root>", ty);
        ip.qualifier = qualifier;
        ip
    }

    /// Sets the qualifier.
    pub fn qualified(mut self, qualifier: Qualifier) -> Self {
        self.qualifier = Some(qualifier);
        self
    }

    /// Allows a null satisfaction for this point.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Same point, but requesting another type. Used for the provided side
    /// of provider injection.
    pub(crate) fn with_type(&self, ty: TypeKey) -> Self {
        let mut ip = self.clone();
        ip.ty = ty;
        ip
    }

    pub fn owner(&self) -> Option<&TypeKey> {
        self.owner.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared type of the point.
    pub fn declared_type(&self) -> &TypeKey {
        &self.ty
    }

    pub fn qualifier(&self) -> Option<&Qualifier> {
        self.qualifier.as_ref()
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }
}

impl fmt::Display for InjectionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.owner {
            Some(owner) => write!(f, "{}.{}", owner, self.name)?,
            None => f.write_str(&self.name)?,
        }
        write!(f, ": ")?;
        if let Some(q) = &self.qualifier {
            write!(f, "{} ", q)?;
        }
        write!(f, "{}", self.ty)
    }
}

impl fmt::Debug for InjectionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// An unresolved request for a dependency.
///
/// A desire starts out as the declared type of its injection point and is
/// narrowed by bind rules until it carries a [`Satisfaction`]. Desires are
/// immutable; restricting one produces a new desire for the same point.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Desire {
    injection_point: InjectionPoint,
    desired_type: TypeKey,
    satisfaction: Option<Satisfaction>,
}

impl Desire {
    pub(crate) fn from_parts(
        injection_point: InjectionPoint,
        desired_type: TypeKey,
        satisfaction: Option<Satisfaction>,
    ) -> Self {
        Self { injection_point, desired_type, satisfaction }
    }

    pub fn injection_point(&self) -> &InjectionPoint {
        &self.injection_point
    }

    pub fn desired_type(&self) -> &TypeKey {
        &self.desired_type
    }

    pub fn qualifier(&self) -> Option<&Qualifier> {
        self.injection_point.qualifier()
    }

    /// The satisfaction, if the desire can be instantiated as it stands.
    pub fn satisfaction(&self) -> Option<&Satisfaction> {
        self.satisfaction.as_ref()
    }

    pub fn is_instantiable(&self) -> bool {
        self.satisfaction.is_some()
    }

    /// Narrows the desire to `ty`. The result is instantiable iff `ty` is
    /// a concrete type in `catalog`.
    pub fn restrict_type(&self, catalog: &TypeCatalog, ty: &TypeKey) -> Desire {
        Desire {
            injection_point: self.injection_point.clone(),
            desired_type: ty.clone(),
            satisfaction: catalog.class_satisfaction(ty),
        }
    }

    /// Narrows the desire to a pre-built satisfaction.
    pub fn restrict(&self, satisfaction: Satisfaction) -> Desire {
        Desire {
            injection_point: self.injection_point.clone(),
            desired_type: satisfaction.erased_type().clone(),
            satisfaction: Some(satisfaction),
        }
    }
}

impl fmt::Display for Desire {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Desire(")?;
        if let Some(q) = self.qualifier() {
            write!(f, "{} ", q)?;
        }
        write!(f, "{}", self.desired_type)?;
        if self.injection_point.owner().is_some() {
            write!(f, " at {}", self.injection_point)?;
        }
        write!(f, ")")
    }
}

impl fmt::Debug for Desire {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Identity shared by every extension of one desire chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChainKey(u64);

impl ChainKey {
    fn fresh() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ChainKey(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// The ordered rewrite history of one logical dependency.
///
/// The first desire is the one declared by the injection point; each bind
/// rule applied appends the desire it produced. All extensions and
/// shrinks of a chain share its [`ChainKey`], which binding functions use
/// to remember per-chain state. The key does not take part in equality:
/// two chains are equal when they hold the same desires.
#[derive(Clone)]
pub struct DesireChain {
    key: ChainKey,
    desires: Arc<[Desire]>,
}

impl DesireChain {
    /// Starts a new chain.
    pub fn singleton(desire: Desire) -> Self {
        Self {
            key: ChainKey::fresh(),
            desires: Arc::from(vec![desire]),
        }
    }

    pub fn key(&self) -> ChainKey {
        self.key
    }

    /// The desire that started the chain.
    pub fn initial_desire(&self) -> &Desire {
        &self.desires[0]
    }

    /// The most recent desire.
    pub fn current_desire(&self) -> &Desire {
        &self.desires[self.desires.len() - 1]
    }

    /// Every desire before the current one.
    pub fn previous_desires(&self) -> &[Desire] {
        &self.desires[..self.desires.len() - 1]
    }

    pub fn desires(&self) -> &[Desire] {
        &self.desires
    }

    pub fn len(&self) -> usize {
        self.desires.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Appends a desire, keeping the chain key.
    pub fn extend(&self, desire: Desire) -> DesireChain {
        let mut desires = Vec::with_capacity(self.desires.len() + 1);
        desires.extend(self.desires.iter().cloned());
        desires.push(desire);
        DesireChain { key: self.key, desires: Arc::from(desires) }
    }

    /// The chain without its last desire, or `None` for a singleton chain.
    pub fn previous(&self) -> Option<DesireChain> {
        if self.desires.len() < 2 {
            return None;
        }
        Some(DesireChain {
            key: self.key,
            desires: Arc::from(self.previous_desires().to_vec()),
        })
    }
}

impl PartialEq for DesireChain {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.desires, &other.desires) || self.desires == other.desires
    }
}

impl Eq for DesireChain {}

impl Hash for DesireChain {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.desires.hash(state);
    }
}

impl fmt::Display for DesireChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, d) in self.desires.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{}", d)?;
        }
        Ok(())
    }
}

impl fmt::Debug for DesireChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DesireChain")
            .field("key", &self.key)
            .field("desires", &self.desires)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desire(ty: &str) -> Desire {
        let key = TypeKey::named(ty);
        Desire::from_parts(InjectionPoint::root(key.clone(), None), key, None)
    }

    #[test]
    fn test_chain_extension_keeps_key() {
        let chain = DesireChain::singleton(desire("I"));
        let longer = chain.extend(desire("Impl"));

        assert_eq!(chain.key(), longer.key());
        assert_eq!(longer.initial_desire(), &desire("I"));
        assert_eq!(longer.current_desire(), &desire("Impl"));
        assert_eq!(longer.previous_desires(), &[desire("I")]);

        let shrunk = longer.previous().unwrap();
        assert_eq!(shrunk, chain);
        assert_eq!(shrunk.key(), chain.key());
        assert!(chain.previous().is_none());
    }

    #[test]
    fn test_chain_equality_ignores_key() {
        let a = DesireChain::singleton(desire("I"));
        let b = DesireChain::singleton(desire("I"));
        assert_ne!(a.key(), b.key());
        assert_eq!(a, b);
    }

    #[test]
    fn test_restrict_replaces_type() {
        let d = desire("I");
        let restricted = d.restrict(Satisfaction::Null(TypeKey::named("I")));
        assert!(restricted.is_instantiable());
        assert_eq!(restricted.injection_point(), d.injection_point());
        assert!(!d.is_instantiable());
    }
}

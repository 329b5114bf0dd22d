//! Bind rules: configured rewrites from a matching desire to a narrower one.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::cache_policy::CachePolicy;
use crate::catalog::TypeCatalog;
use crate::context::QualifierMatcher;
use crate::desire::Desire;
use crate::error::{DiError, DiResult};
use crate::key::TypeKey;
use crate::qualifier::Qualifier;
use crate::satisfaction::{Provider, Satisfaction};

/// What a bind rule rewrites a desire to.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum BindTarget {
    /// Another (sub)type, itself subject to further binding
    Type(TypeKey),
    /// A ready satisfaction
    Satisfaction(Satisfaction),
}

impl BindTarget {
    pub fn ty(&self) -> &TypeKey {
        match self {
            BindTarget::Type(ty) => ty,
            BindTarget::Satisfaction(sat) => sat.erased_type(),
        }
    }
}

impl fmt::Display for BindTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindTarget::Type(ty) => write!(f, "{}", ty),
            BindTarget::Satisfaction(sat) => write!(f, "{}", sat),
        }
    }
}

/// Flags controlling how the solver treats the result of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BindFlags {
    /// The resulting edge is exempt from graph rewriting
    pub fixed: bool,
    /// Stop binding once the result is instantiable
    pub terminal: bool,
    /// Resolve the result's dependencies in a later pass
    pub deferred: bool,
    /// The rule may be undone if its target cannot be resolved
    pub skippable: bool,
}

/// An immutable rule mapping a matching desire to its target.
///
/// A rule matches a desire whose type equals the rule's dependency type
/// and whose qualifier is accepted by the rule's qualifier matcher. The
/// target's type is always assignable to the dependency type.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BindRule {
    depend_type: TypeKey,
    qualifier: QualifierMatcher,
    target: BindTarget,
    policy: CachePolicy,
    flags: BindFlags,
}

impl BindRule {
    /// Starts a rule for desires of `depend_type`.
    pub fn bind(depend_type: impl Into<TypeKey>) -> BindRuleBuilder {
        BindRuleBuilder::new(depend_type.into())
    }

    pub(crate) fn new(
        depend_type: TypeKey,
        qualifier: QualifierMatcher,
        target: BindTarget,
        policy: CachePolicy,
        flags: BindFlags,
    ) -> Self {
        Self { depend_type, qualifier, target, policy, flags }
    }

    /// A copy of this rule for another dependency type.
    pub(crate) fn retarget(&self, depend_type: TypeKey) -> Self {
        Self { depend_type, ..self.clone() }
    }

    pub fn depend_type(&self) -> &TypeKey {
        &self.depend_type
    }

    pub fn qualifier(&self) -> &QualifierMatcher {
        &self.qualifier
    }

    pub fn target(&self) -> &BindTarget {
        &self.target
    }

    pub fn cache_policy(&self) -> CachePolicy {
        self.policy
    }

    pub fn flags(&self) -> BindFlags {
        self.flags
    }

    pub fn matches(&self, desire: &Desire) -> bool {
        desire.desired_type() == &self.depend_type && self.qualifier.matches(desire.qualifier())
    }

    /// Restricts `desire` to the rule's target.
    pub fn apply(&self, desire: &Desire, catalog: &TypeCatalog) -> Desire {
        match &self.target {
            BindTarget::Type(ty) => desire.restrict_type(catalog, ty),
            BindTarget::Satisfaction(sat) => desire.restrict(sat.clone()),
        }
    }
}

impl fmt::Display for BindRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bind ")?;
        if self.qualifier != QualifierMatcher::Default {
            write!(f, "{} ", self.qualifier)?;
        }
        write!(f, "{} to {}", self.depend_type, self.target)?;
        if self.policy != CachePolicy::NoPreference {
            write!(f, " [{}]", self.policy)?;
        }
        let flags = [
            (self.flags.fixed, "fixed"),
            (self.flags.terminal, "terminal"),
            (self.flags.deferred, "deferred"),
            (self.flags.skippable, "skippable"),
        ];
        let set: Vec<&str> = flags.iter().filter(|(on, _)| *on).map(|(_, name)| *name).collect();
        if !set.is_empty() {
            write!(f, " ({})", set.join(", "))?;
        }
        Ok(())
    }
}

impl fmt::Debug for BindRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Builder for [`BindRule`].
///
/// Rules default to the [`QualifierMatcher::Default`] matcher, so a plain
/// `bind(ty)` also applies to qualifiers that allow default bindings.
/// Binding to a type is non-terminal (the target may be bound further);
/// binding to an instance, provider or null is terminal.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolver::{BindRule, CachePolicy, Qualifier, TypeCatalog, TypeSpec};
///
/// let mut types = TypeCatalog::builder();
/// types.add(TypeSpec::interface("Store"));
/// types.add(TypeSpec::class("MemoryStore").extends("Store"));
/// let catalog = types.build();
///
/// let rule = BindRule::bind("Store")
///     .qualified(Qualifier::named("cache"))
///     .to("MemoryStore")
///     .cache_policy(CachePolicy::Memoize)
///     .build(&catalog)
///     .unwrap();
/// assert_eq!(rule.to_string(), "bind @Named(value=cache) Store to MemoryStore [memoize]");
///
/// assert!(BindRule::bind("MemoryStore").to("Store").build(&catalog).is_err());
/// ```
#[derive(Clone)]
pub struct BindRuleBuilder {
    depend_type: TypeKey,
    qualifier: QualifierMatcher,
    target: Option<BindTarget>,
    policy: CachePolicy,
    flags: BindFlags,
}

impl BindRuleBuilder {
    fn new(depend_type: TypeKey) -> Self {
        Self {
            depend_type,
            qualifier: QualifierMatcher::Default,
            target: None,
            policy: CachePolicy::NoPreference,
            flags: BindFlags::default(),
        }
    }

    pub fn qualified(self, qualifier: Qualifier) -> Self {
        self.qualifier_matcher(QualifierMatcher::Instance(qualifier))
    }

    pub fn qualifier_matcher(mut self, matcher: QualifierMatcher) -> Self {
        self.qualifier = matcher;
        self
    }

    pub fn to(mut self, ty: impl Into<TypeKey>) -> Self {
        self.target = Some(BindTarget::Type(ty.into()));
        self.flags.terminal = false;
        self
    }

    pub fn to_satisfaction(mut self, satisfaction: Satisfaction) -> Self {
        self.target = Some(BindTarget::Satisfaction(satisfaction));
        self.flags.terminal = true;
        self
    }

    /// Binds to a pre-built instance of the dependency type.
    pub fn to_instance<T: Any + Send + Sync>(self, value: T) -> Self {
        let ty = self.depend_type.clone();
        self.to_satisfaction(Satisfaction::instance(ty, value))
    }

    /// Binds to a provider class that produces the dependency type.
    pub fn to_provider(self, provider: impl Into<TypeKey>) -> Self {
        let ty = self.depend_type.clone();
        self.to_satisfaction(Satisfaction::provider_class(provider.into(), ty))
    }

    pub fn to_provider_instance(self, provider: Arc<dyn Provider>) -> Self {
        let ty = self.depend_type.clone();
        self.to_satisfaction(Satisfaction::provider_instance(ty, provider))
    }

    pub fn to_null(self) -> Self {
        let ty = self.depend_type.clone();
        self.to_satisfaction(Satisfaction::null(ty))
    }

    pub fn cache_policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn fixed(mut self) -> Self {
        self.flags.fixed = true;
        self
    }

    pub fn terminal(mut self, terminal: bool) -> Self {
        self.flags.terminal = terminal;
        self
    }

    pub fn deferred(mut self) -> Self {
        self.flags.deferred = true;
        self
    }

    pub fn skippable(mut self) -> Self {
        self.flags.skippable = true;
        self
    }

    /// Validates and builds the rule.
    pub fn build(self, catalog: &TypeCatalog) -> DiResult<BindRule> {
        let target = self.target.ok_or_else(|| {
            DiError::InvalidBinding(format!("no target given for {}", self.depend_type))
        })?;
        if !catalog.is_assignable(target.ty(), &self.depend_type) {
            return Err(DiError::InvalidBinding(format!(
                "{} is not assignable to {}",
                target.ty(),
                self.depend_type
            )));
        }
        Ok(BindRule::new(self.depend_type, self.qualifier, target, self.policy, self.flags))
    }
}

use std::fmt;

use crate::cache_policy::CachePolicy;
use crate::catalog::TypeCatalog;
use crate::component::{Component, Dependency};
use crate::desire::DesireChain;
use crate::qualifier::Qualifier;
use crate::satisfaction::Satisfaction;

/// The terminal outcome of running the binding functions on one desire.
#[derive(Clone)]
pub(crate) struct Resolution {
    pub(crate) satisfaction: Satisfaction,
    pub(crate) policy: CachePolicy,
    pub(crate) chain: DesireChain,
    pub(crate) fixed: bool,
    pub(crate) deferred: bool,
    pub(crate) skippable: bool,
}

impl Resolution {
    /// The graph label, resolving `NoPreference` against the satisfaction's
    /// own default and then `default_policy`.
    pub(crate) fn component(&self, catalog: &TypeCatalog, default_policy: CachePolicy) -> Component {
        let policy = self
            .policy
            .or(self.satisfaction.default_cache_policy(catalog))
            .or(default_policy);
        Component::new(self.satisfaction.clone(), policy)
    }

    pub(crate) fn dependency(&self) -> Dependency {
        Dependency::new(self.chain.clone(), self.fixed)
    }

    pub(crate) fn qualifier(&self) -> Option<Qualifier> {
        self.chain.current_desire().qualifier().cloned()
    }

    /// Undoes the last binding, if this resolution is skippable and the
    /// previous desire in the chain is instantiable on its own.
    pub(crate) fn backtrack(&self) -> Option<Resolution> {
        if !self.skippable {
            return None;
        }
        let previous = self.chain.previous()?;
        let satisfaction = previous.current_desire().satisfaction()?.clone();
        Some(Resolution {
            satisfaction,
            policy: self.policy,
            chain: previous,
            fixed: self.fixed,
            deferred: self.deferred,
            skippable: false,
        })
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolution")
            .field("satisfaction", &self.satisfaction)
            .field("policy", &self.policy)
            .field("chain", &self.chain)
            .field("fixed", &self.fixed)
            .field("deferred", &self.deferred)
            .field("skippable", &self.skippable)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TypeSpec;
    use crate::key::TypeKey;

    #[test]
    fn test_backtrack_requires_instantiable_prefix() {
        let mut types = TypeCatalog::builder();
        types
            .add(TypeSpec::interface("I"))
            .add(TypeSpec::class("Base").extends("I"))
            .add(TypeSpec::class("Fancy").extends("Base"));
        let catalog = types.build();

        let base = catalog.root_desire(&TypeKey::named("Base"), None);
        let fancy = base.restrict_type(&catalog, &TypeKey::named("Fancy"));
        let chain = DesireChain::singleton(base).extend(fancy.clone());
        let resolution = Resolution {
            satisfaction: fancy.satisfaction().unwrap().clone(),
            policy: CachePolicy::NoPreference,
            chain,
            fixed: false,
            deferred: false,
            skippable: true,
        };

        let back = resolution.backtrack().unwrap();
        assert_eq!(back.satisfaction, Satisfaction::Class(TypeKey::named("Base")));
        assert!(back.backtrack().is_none());

        let interface = catalog.root_desire(&TypeKey::named("I"), None);
        let from_interface = Resolution {
            chain: DesireChain::singleton(interface).extend(fancy),
            ..resolution
        };
        assert!(from_interface.backtrack().is_none());
    }

    #[test]
    fn test_component_policy_fallbacks() {
        let mut types = TypeCatalog::builder();
        types.add(TypeSpec::class("S").cache_policy(CachePolicy::Memoize));
        types.add(TypeSpec::class("P"));
        let catalog = types.build();

        let resolution = |ty: &str, policy| Resolution {
            satisfaction: Satisfaction::Class(TypeKey::named(ty)),
            policy,
            chain: DesireChain::singleton(catalog.root_desire(&TypeKey::named(ty), None)),
            fixed: false,
            deferred: false,
            skippable: false,
        };

        let explicit = resolution("S", CachePolicy::NewInstance).component(&catalog, CachePolicy::NoPreference);
        assert_eq!(explicit.cache_policy(), CachePolicy::NewInstance);
        let class_level = resolution("S", CachePolicy::NoPreference).component(&catalog, CachePolicy::NewInstance);
        assert_eq!(class_level.cache_policy(), CachePolicy::Memoize);
        let solver_default = resolution("P", CachePolicy::NoPreference).component(&catalog, CachePolicy::NewInstance);
        assert_eq!(solver_default.cache_policy(), CachePolicy::NewInstance);
    }
}
